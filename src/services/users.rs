use crate::{
    auth::{normalize_email, AuthService, Role},
    db::DbPool,
    entities::{driver, supplier, user},
    errors::ServiceError,
    services::{fetch_page, PageRequest, Paged},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Row data for a new account; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub supplier_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
}

/// Inserts an account after checking the email is free
pub async fn insert_user<C: ConnectionTrait>(
    db: &C,
    new_user: NewUser,
) -> Result<user::Model, ServiceError> {
    let email = normalize_email(&new_user.email);

    let taken = user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
        .is_some();
    if taken {
        return Err(ServiceError::Conflict(format!(
            "email {} is already registered",
            email
        )));
    }

    let now = Utc::now();
    let model = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        name: Set(new_user.name.trim().to_string()),
        password_hash: Set(new_user.password_hash),
        role: Set(new_user.role),
        supplier_id: Set(new_user.supplier_id),
        driver_id: Set(new_user.driver_id),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    };

    Ok(model.insert(db).await?)
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: Role,
    pub supplier_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Admin-side account management
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self { db_pool, auth }
    }

    pub async fn list_users(
        &self,
        role: Option<Role>,
        page: PageRequest,
    ) -> Result<Paged<user::Model>, ServiceError> {
        let mut query = user::Entity::find().order_by_asc(user::Column::Email);
        if let Some(role) = role {
            query = query.filter(user::Column::Role.eq(role));
        }
        fetch_page(&*self.db_pool, query, page).await
    }

    /// Creates an account of any role. Tenant ids must point at existing rows.
    #[instrument(skip(self, request), fields(email = %request.email, role = %request.role))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<user::Model, ServiceError> {
        request.validate()?;
        let db = &*self.db_pool;

        let (supplier_id, driver_id) = match request.role {
            Role::Supplier => {
                let id = request.supplier_id.ok_or_else(|| {
                    ServiceError::ValidationError("supplier users need a supplier_id".into())
                })?;
                if supplier::Entity::find_by_id(id).one(db).await?.is_none() {
                    return Err(ServiceError::ValidationError(format!(
                        "supplier {} does not exist",
                        id
                    )));
                }
                (Some(id), None)
            }
            Role::Driver => {
                let id = request.driver_id.ok_or_else(|| {
                    ServiceError::ValidationError("driver users need a driver_id".into())
                })?;
                if driver::Entity::find_by_id(id).one(db).await?.is_none() {
                    return Err(ServiceError::ValidationError(format!(
                        "driver {} does not exist",
                        id
                    )));
                }
                (None, Some(id))
            }
            Role::Admin | Role::Client => (None, None),
        };

        let password_hash = self.auth.hash_password(&request.password)?;
        let user = insert_user(
            db,
            NewUser {
                email: request.email,
                name: request.name,
                password_hash,
                role: request.role,
                supplier_id,
                driver_id,
            },
        )
        .await?;

        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<user::Model, ServiceError> {
        let db = &*self.db_pool;
        let user = user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))?;

        let mut active: user::ActiveModel = user.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        info!(user_id = %id, is_active, "user activation changed");
        Ok(updated)
    }
}
