use crate::{
    auth::Scope,
    db::DbPool,
    entities::{product, purchase_order, supplier},
    errors::ServiceError,
    services::{fetch_page, PageRequest, Paged},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSupplierRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateSupplierRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

/// Supplier (tenant) management
#[derive(Clone)]
pub struct SupplierService {
    db_pool: Arc<DbPool>,
}

impl SupplierService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Admins see every supplier, supplier users only their own row
    pub async fn list_suppliers(
        &self,
        scope: Scope,
        page: PageRequest,
    ) -> Result<Paged<supplier::Model>, ServiceError> {
        let mut query = supplier::Entity::find().order_by_asc(supplier::Column::Name);
        match scope {
            Scope::All => {}
            Scope::Supplier(id) => query = query.filter(supplier::Column::Id.eq(id)),
            Scope::Driver(_) | Scope::Client(_) => {
                return Err(ServiceError::Forbidden("suppliers are not visible to this role".into()))
            }
        }
        fetch_page(&*self.db_pool, query, page).await
    }

    pub async fn get_supplier(&self, scope: Scope, id: Uuid) -> Result<supplier::Model, ServiceError> {
        let visible = match scope {
            Scope::All => true,
            Scope::Supplier(own) => own == id,
            Scope::Driver(_) | Scope::Client(_) => false,
        };
        if !visible {
            return Err(ServiceError::not_found("Supplier", id));
        }
        self.find(id).await
    }

    async fn find(&self, id: Uuid) -> Result<supplier::Model, ServiceError> {
        supplier::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Supplier", id))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_supplier(
        &self,
        request: CreateSupplierRequest,
    ) -> Result<supplier::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let model = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            contact_name: Set(request.contact_name),
            email: Set(request.email),
            phone: Set(request.phone),
            address: Set(request.address),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db_pool).await?;
        info!(supplier_id = %created.id, "supplier created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_supplier(
        &self,
        id: Uuid,
        request: UpdateSupplierRequest,
    ) -> Result<supplier::Model, ServiceError> {
        request.validate()?;
        let existing = self.find(id).await?;

        let mut active: supplier::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(contact_name) = request.contact_name {
            active.contact_name = Set(Some(contact_name));
        }
        if let Some(email) = request.email {
            active.email = Set(Some(email));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db_pool).await?;
        info!(supplier_id = %id, "supplier updated");
        Ok(updated)
    }

    /// Deletes a supplier that has no products and no orders
    #[instrument(skip(self))]
    pub async fn delete_supplier(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let existing = self.find(id).await?;

        let products = product::Entity::find()
            .filter(product::Column::SupplierId.eq(id))
            .count(db)
            .await?;
        let orders = purchase_order::Entity::find()
            .filter(purchase_order::Column::SupplierId.eq(id))
            .count(db)
            .await?;
        if products > 0 || orders > 0 {
            warn!(supplier_id = %id, products, orders, "refusing to delete supplier in use");
            return Err(ServiceError::Conflict(format!(
                "supplier {} still has {} products and {} orders",
                id, products, orders
            )));
        }

        existing.delete(db).await?;
        info!(supplier_id = %id, "supplier deleted");
        Ok(())
    }
}
