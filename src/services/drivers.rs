use crate::{
    auth::Scope,
    db::DbPool,
    entities::driver,
    errors::ServiceError,
    services::{fetch_page, PageRequest, Paged},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDriverRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub phone: Option<String>,
    pub vehicle_description: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateDriverRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub phone: Option<String>,
    pub vehicle_description: Option<String>,
    pub license_number: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct DriverService {
    db_pool: Arc<DbPool>,
}

impl DriverService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    pub async fn list_drivers(
        &self,
        active_only: bool,
        page: PageRequest,
    ) -> Result<Paged<driver::Model>, ServiceError> {
        let mut query = driver::Entity::find().order_by_asc(driver::Column::Name);
        if active_only {
            query = query.filter(driver::Column::IsActive.eq(true));
        }
        fetch_page(&*self.db_pool, query, page).await
    }

    /// Admins read any driver; a driver reads only itself
    pub async fn get_driver(&self, scope: Scope, id: Uuid) -> Result<driver::Model, ServiceError> {
        let visible = match scope {
            Scope::All => true,
            Scope::Driver(own) => own == id,
            Scope::Supplier(_) | Scope::Client(_) => false,
        };
        if !visible {
            return Err(ServiceError::not_found("Driver", id));
        }
        driver::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Driver", id))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_driver(
        &self,
        request: CreateDriverRequest,
    ) -> Result<driver::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let created = driver::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            phone: Set(request.phone),
            vehicle_description: Set(request.vehicle_description),
            license_number: Set(request.license_number),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;
        info!(driver_id = %created.id, "driver created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_driver(
        &self,
        id: Uuid,
        request: UpdateDriverRequest,
    ) -> Result<driver::Model, ServiceError> {
        request.validate()?;
        let existing = self.get_driver(Scope::All, id).await?;

        let mut active: driver::ActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(vehicle) = request.vehicle_description {
            active.vehicle_description = Set(Some(vehicle));
        }
        if let Some(license) = request.license_number {
            active.license_number = Set(Some(license));
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db_pool).await?;
        info!(driver_id = %id, "driver updated");
        Ok(updated)
    }
}
