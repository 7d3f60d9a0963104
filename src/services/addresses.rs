use crate::{
    auth::{Role, Scope},
    db::DbPool,
    entities::{client_address, user},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAddressRequest {
    /// Only used by admins; clients always write their own addresses
    pub client_id: Option<Uuid>,
    #[validate(length(min = 1, max = 60))]
    pub label: String,
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateAddressRequest {
    #[validate(length(min = 1, max = 60))]
    pub label: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub street: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    pub is_default: Option<bool>,
}

/// Client delivery addresses
#[derive(Clone)]
pub struct AddressService {
    db_pool: Arc<DbPool>,
}

async fn clear_default<C: ConnectionTrait>(
    db: &C,
    client_id: Uuid,
    keep: Uuid,
) -> Result<(), ServiceError> {
    client_address::Entity::update_many()
        .col_expr(client_address::Column::IsDefault, Expr::value(false))
        .filter(client_address::Column::ClientId.eq(client_id))
        .filter(client_address::Column::Id.ne(keep))
        .exec(db)
        .await?;
    Ok(())
}

impl AddressService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Clients list their own addresses; admins may narrow by client
    pub async fn list_addresses(
        &self,
        scope: Scope,
        client_id: Option<Uuid>,
    ) -> Result<Vec<client_address::Model>, ServiceError> {
        let owner = match scope {
            Scope::All => client_id,
            Scope::Client(own) => Some(own),
            Scope::Supplier(_) | Scope::Driver(_) => {
                return Err(ServiceError::Forbidden("addresses belong to clients".into()))
            }
        };

        let mut query = client_address::Entity::find()
            .order_by_desc(client_address::Column::IsDefault)
            .order_by_asc(client_address::Column::Label);
        if let Some(owner) = owner {
            query = query.filter(client_address::Column::ClientId.eq(owner));
        }
        Ok(query.all(&*self.db_pool).await?)
    }

    async fn find_in_scope(&self, scope: Scope, id: Uuid) -> Result<client_address::Model, ServiceError> {
        let mut query = client_address::Entity::find_by_id(id);
        match scope {
            Scope::All => {}
            Scope::Client(own) => query = query.filter(client_address::Column::ClientId.eq(own)),
            Scope::Supplier(_) | Scope::Driver(_) => {
                return Err(ServiceError::Forbidden("addresses belong to clients".into()))
            }
        }
        query
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Address", id))
    }

    #[instrument(skip(self, request), fields(label = %request.label))]
    pub async fn create_address(
        &self,
        scope: Scope,
        request: CreateAddressRequest,
    ) -> Result<client_address::Model, ServiceError> {
        request.validate()?;
        let db = &*self.db_pool;

        let client_id = match scope {
            Scope::Client(own) => own,
            Scope::All => {
                let id = request.client_id.ok_or_else(|| {
                    ServiceError::ValidationError("client_id is required".into())
                })?;
                let owner = user::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::ValidationError(format!("user {} does not exist", id)))?;
                if owner.role != Role::Client {
                    return Err(ServiceError::ValidationError(format!(
                        "user {} is not a client",
                        id
                    )));
                }
                id
            }
            Scope::Supplier(_) | Scope::Driver(_) => {
                return Err(ServiceError::Forbidden("addresses belong to clients".into()))
            }
        };

        let txn = db.begin().await?;
        let existing = client_address::Entity::find()
            .filter(client_address::Column::ClientId.eq(client_id))
            .count(&txn)
            .await?;
        // The first address becomes the default.
        let is_default = request.is_default || existing == 0;

        let now = Utc::now();
        let created = client_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            client_id: Set(client_id),
            label: Set(request.label),
            street: Set(request.street),
            city: Set(request.city),
            state: Set(request.state),
            postal_code: Set(request.postal_code),
            latitude: Set(request.latitude),
            longitude: Set(request.longitude),
            is_default: Set(is_default),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        if is_default {
            clear_default(&txn, client_id, created.id).await?;
        }
        txn.commit().await?;

        info!(address_id = %created.id, %client_id, "address created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_address(
        &self,
        scope: Scope,
        id: Uuid,
        request: UpdateAddressRequest,
    ) -> Result<client_address::Model, ServiceError> {
        request.validate()?;
        let existing = self.find_in_scope(scope, id).await?;
        let client_id = existing.client_id;

        let txn = self.db_pool.begin().await?;
        let mut active: client_address::ActiveModel = existing.into();
        if let Some(label) = request.label {
            active.label = Set(label);
        }
        if let Some(street) = request.street {
            active.street = Set(street);
        }
        if let Some(city) = request.city {
            active.city = Set(city);
        }
        if let Some(state) = request.state {
            active.state = Set(Some(state));
        }
        if let Some(postal_code) = request.postal_code {
            active.postal_code = Set(Some(postal_code));
        }
        if let Some(latitude) = request.latitude {
            active.latitude = Set(Some(latitude));
        }
        if let Some(longitude) = request.longitude {
            active.longitude = Set(Some(longitude));
        }
        if let Some(is_default) = request.is_default {
            active.is_default = Set(is_default);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        if request.is_default == Some(true) {
            clear_default(&txn, client_id, id).await?;
        }
        txn.commit().await?;

        info!(address_id = %id, "address updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_address(&self, scope: Scope, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.find_in_scope(scope, id).await?;
        existing.delete(&*self.db_pool).await?;
        info!(address_id = %id, "address deleted");
        Ok(())
    }
}
