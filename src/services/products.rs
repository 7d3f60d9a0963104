use crate::{
    auth::Scope,
    db::DbPool,
    entities::{order_item, product, supplier},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{fetch_page, PageRequest, Paged},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        return Err(ValidationError::new("unit_price must not be negative"));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    /// Required for admins; suppliers default to their own tenant
    pub supplier_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    #[validate(custom = "validate_price")]
    #[schema(value_type = String, example = "4.50")]
    pub unit_price: Decimal,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub stock_quantity: i32,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub reorder_point: i32,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 64))]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    #[validate(custom = "validate_price")]
    #[schema(value_type = Option<String>)]
    pub unit_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub reorder_point: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdjustStockRequest {
    /// Signed change applied to `stock_quantity`
    pub delta: i32,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, IntoParams)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub supplier_id: Option<Uuid>,
}

/// Catalog and stock operations
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    fn scope_condition(scope: Scope) -> Condition {
        match scope {
            Scope::All => Condition::all(),
            Scope::Supplier(id) => Condition::all().add(product::Column::SupplierId.eq(id)),
            // Drivers and clients browse the active catalog
            Scope::Driver(_) | Scope::Client(_) => {
                Condition::all().add(product::Column::IsActive.eq(true))
            }
        }
    }

    /// Filtered, paginated catalog listing
    pub async fn list_products(
        &self,
        scope: Scope,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Paged<product::Model>, ServiceError> {
        let mut query = product::Entity::find()
            .filter(Self::scope_condition(scope))
            .order_by_asc(product::Column::Name);

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.contains(search))
                    .add(product::Column::Sku.contains(search))
                    .add(product::Column::Description.contains(search)),
            );
        }
        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            query = query.filter(product::Column::Category.eq(category));
        }
        if let Some(supplier_id) = filter.supplier_id {
            query = query.filter(product::Column::SupplierId.eq(supplier_id));
        }

        fetch_page(&*self.db_pool, query, page).await
    }

    /// Out-of-scope products are reported as missing
    pub async fn get_product(&self, scope: Scope, id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .filter(Self::scope_condition(scope))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }

    /// Products whose stock is strictly below their reorder point, largest shortfall first
    pub async fn low_stock(&self, scope: Scope) -> Result<Vec<product::Model>, ServiceError> {
        let mut products = product::Entity::find()
            .filter(Self::scope_condition(scope))
            .filter(
                Expr::col(product::Column::StockQuantity)
                    .lt(Expr::col(product::Column::ReorderPoint)),
            )
            .order_by_asc(product::Column::Name)
            .all(&*self.db_pool)
            .await?;

        products.sort_by_key(|p| std::cmp::Reverse(p.shortfall()));
        Ok(products)
    }

    /// Resolves which tenant a write targets. Suppliers can only write their own.
    fn owning_supplier(scope: Scope, requested: Option<Uuid>) -> Result<Uuid, ServiceError> {
        match (scope, requested) {
            (Scope::All, Some(id)) => Ok(id),
            (Scope::All, None) => Err(ServiceError::ValidationError(
                "supplier_id is required".into(),
            )),
            (Scope::Supplier(own), None) => Ok(own),
            (Scope::Supplier(own), Some(id)) if id == own => Ok(own),
            (Scope::Supplier(_), Some(_)) => Err(ServiceError::Forbidden(
                "suppliers can only manage their own products".into(),
            )),
            (Scope::Driver(_) | Scope::Client(_), _) => Err(ServiceError::Forbidden(
                "role cannot manage products".into(),
            )),
        }
    }

    async fn ensure_sku_free(&self, sku: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = product::Entity::find().filter(product::Column::Sku.eq(sku));
        if let Some(id) = except {
            query = query.filter(product::Column::Id.ne(id));
        }
        if query.one(&*self.db_pool).await?.is_some() {
            return Err(ServiceError::Conflict(format!("sku {} already exists", sku)));
        }
        Ok(())
    }

    /// Loads a product for writing. Another tenant's product is forbidden, not missing.
    async fn find_for_write(&self, scope: Scope, id: Uuid) -> Result<product::Model, ServiceError> {
        let existing = product::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;
        Self::owning_supplier(scope, Some(existing.supplier_id))?;
        Ok(existing)
    }

    #[instrument(skip(self, request), fields(sku = %request.sku))]
    pub async fn create_product(
        &self,
        scope: Scope,
        request: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;
        let supplier_id = Self::owning_supplier(scope, request.supplier_id)?;

        supplier::Entity::find_by_id(supplier_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Supplier", supplier_id))?;

        let sku = request.sku.trim().to_string();
        self.ensure_sku_free(&sku, None).await?;

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            supplier_id: Set(supplier_id),
            sku: Set(sku),
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            category: Set(request.category),
            unit: Set(request.unit.unwrap_or_else(|| "each".to_string())),
            unit_price: Set(request.unit_price),
            stock_quantity: Set(request.stock_quantity),
            reorder_point: Set(request.reorder_point),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "failed to insert product");
            ServiceError::from(e)
        })?;
        info!(product_id = %created.id, %supplier_id, "product created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        scope: Scope,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;
        let existing = self.find_for_write(scope, id).await?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(sku) = request.sku {
            let sku = sku.trim().to_string();
            self.ensure_sku_free(&sku, Some(id)).await?;
            active.sku = Set(sku);
        }
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(category) = request.category {
            active.category = Set(Some(category));
        }
        if let Some(unit) = request.unit {
            active.unit = Set(unit);
        }
        if let Some(price) = request.unit_price {
            active.unit_price = Set(price);
        }
        if let Some(reorder_point) = request.reorder_point {
            active.reorder_point = Set(reorder_point);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db_pool).await?;
        info!(product_id = %id, "product updated");
        Ok(updated)
    }

    /// Deletes a product that no order line references
    #[instrument(skip(self))]
    pub async fn delete_product(&self, scope: Scope, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.find_for_write(scope, id).await?;

        let referenced = order_item::Entity::find()
            .filter(order_item::Column::ProductId.eq(id))
            .count(&*self.db_pool)
            .await?;
        if referenced > 0 {
            warn!(product_id = %id, referenced, "refusing to delete ordered product");
            return Err(ServiceError::Conflict(format!(
                "product {} appears on {} order lines; deactivate it instead",
                id, referenced
            )));
        }

        existing.delete(&*self.db_pool).await?;
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Applies a signed stock delta. Stock never goes below zero.
    #[instrument(skip(self, request), fields(delta = request.delta))]
    pub async fn adjust_stock(
        &self,
        scope: Scope,
        id: Uuid,
        request: AdjustStockRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;
        self.find_for_write(scope, id).await?;

        let txn = self.db_pool.begin().await?;
        let current = product::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;

        let new_quantity = current
            .stock_quantity
            .checked_add(request.delta)
            .filter(|q| *q >= 0)
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "stock for {} cannot go below zero (have {}, delta {})",
                    current.sku, current.stock_quantity, request.delta
                ))
            })?;

        let old_quantity = current.stock_quantity;
        let mut active: product::ActiveModel = current.into();
        active.stock_quantity = Set(new_quantity);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(
            product_id = %id,
            old_quantity,
            new_quantity,
            reason = request.reason.as_deref().unwrap_or(""),
            "stock adjusted"
        );
        if updated.is_low_stock() {
            warn!(
                product_id = %id,
                stock = new_quantity,
                reorder_point = updated.reorder_point,
                "stock below reorder point"
            );
        }
        self.event_sender
            .publish(Event::StockAdjusted {
                product_id: id,
                old_quantity,
                new_quantity,
            })
            .await;

        Ok(updated)
    }
}
