use crate::{
    auth::Scope,
    db::DbPool,
    entities::{delivery_tracking, driver, purchase_order, DeliveryStatus, PurchaseOrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{fetch_page, orders::find_order_in_scope, PageRequest, Paged},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDeliveryRequest {
    pub purchase_order_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignDriverRequest {
    pub driver_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateDeliveryStatusRequest {
    pub status: DeliveryStatus,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateLocationRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    pub estimated_arrival: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, IntoParams)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
    pub purchase_order_id: Option<Uuid>,
}

/// Tenant filter for deliveries
pub(crate) fn delivery_scope_condition(scope: Scope) -> Condition {
    let orders_where = |condition: sea_orm::sea_query::SimpleExpr| {
        delivery_tracking::Column::PurchaseOrderId.in_subquery(
            Query::select()
                .column(purchase_order::Column::Id)
                .from(purchase_order::Entity)
                .and_where(condition)
                .to_owned(),
        )
    };

    match scope {
        Scope::All => Condition::all(),
        Scope::Driver(id) => Condition::all().add(delivery_tracking::Column::DriverId.eq(id)),
        Scope::Supplier(id) => {
            Condition::all().add(orders_where(purchase_order::Column::SupplierId.eq(id)))
        }
        Scope::Client(user_id) => {
            Condition::all().add(orders_where(purchase_order::Column::ClientId.eq(user_id)))
        }
    }
}

async fn find_delivery_in_scope<C: ConnectionTrait>(
    db: &C,
    scope: Scope,
    id: Uuid,
) -> Result<delivery_tracking::Model, ServiceError> {
    delivery_tracking::Entity::find_by_id(id)
        .filter(delivery_scope_condition(scope))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Delivery", id))
}

async fn find_active_driver<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<driver::Model, ServiceError> {
    let driver = driver::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Driver", id))?;
    if !driver.is_active {
        return Err(ServiceError::InvalidInput(format!(
            "driver {} is not active",
            id
        )));
    }
    Ok(driver)
}

/// Delivery tracking and its effect on the parent order
#[derive(Clone)]
pub struct DeliveryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl DeliveryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Opens tracking for an order. An order has at most one active delivery.
    #[instrument(skip(self, request), fields(order_id = %request.purchase_order_id))]
    pub async fn create_delivery(
        &self,
        scope: Scope,
        request: CreateDeliveryRequest,
    ) -> Result<delivery_tracking::Model, ServiceError> {
        request.validate()?;
        let txn = self.db_pool.begin().await?;

        let order = find_order_in_scope(&txn, scope, request.purchase_order_id).await?;
        if order.status.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "order {} is {}",
                order.po_number, order.status
            )));
        }

        let active = delivery_tracking::Entity::find()
            .filter(delivery_tracking::Column::PurchaseOrderId.eq(order.id))
            .filter(delivery_tracking::Column::Status.is_in(DeliveryStatus::active_statuses()))
            .one(&txn)
            .await?;
        if let Some(existing) = active {
            return Err(ServiceError::Conflict(format!(
                "order {} already has active delivery {}",
                order.po_number, existing.id
            )));
        }

        if let Some(driver_id) = request.driver_id {
            find_active_driver(&txn, driver_id).await?;
        }

        let now = Utc::now();
        let status = if request.driver_id.is_some() {
            DeliveryStatus::Assigned
        } else {
            DeliveryStatus::Pending
        };
        let created = delivery_tracking::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_order_id: Set(order.id),
            driver_id: Set(request.driver_id),
            status: Set(status),
            current_latitude: Set(None),
            current_longitude: Set(None),
            estimated_arrival: Set(request.estimated_arrival),
            delivered_at: Set(None),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(format!(
                "order {} already has an active delivery",
                order.po_number
            )),
            _ => ServiceError::from(e),
        })?;
        txn.commit().await?;

        info!(delivery_id = %created.id, order_id = %order.id, %status, "delivery created");
        self.event_sender
            .publish(Event::DeliveryCreated {
                delivery_id: created.id,
                order_id: order.id,
                driver_id: created.driver_id,
            })
            .await;
        Ok(created)
    }

    pub async fn list_deliveries(
        &self,
        scope: Scope,
        filter: DeliveryFilter,
        page: PageRequest,
    ) -> Result<Paged<delivery_tracking::Model>, ServiceError> {
        let mut query = delivery_tracking::Entity::find()
            .filter(delivery_scope_condition(scope))
            .order_by_desc(delivery_tracking::Column::CreatedAt);
        if let Some(status) = filter.status {
            query = query.filter(delivery_tracking::Column::Status.eq(status));
        }
        if let Some(order_id) = filter.purchase_order_id {
            query = query.filter(delivery_tracking::Column::PurchaseOrderId.eq(order_id));
        }
        fetch_page(&*self.db_pool, query, page).await
    }

    pub async fn get_delivery(
        &self,
        scope: Scope,
        id: Uuid,
    ) -> Result<delivery_tracking::Model, ServiceError> {
        find_delivery_in_scope(&*self.db_pool, scope, id).await
    }

    #[instrument(skip(self))]
    pub async fn assign_driver(
        &self,
        scope: Scope,
        id: Uuid,
        driver_id: Uuid,
    ) -> Result<delivery_tracking::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let delivery = find_delivery_in_scope(&txn, scope, id).await?;
        if delivery.status.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "delivery {} is already {}",
                id, delivery.status
            )));
        }
        find_active_driver(&txn, driver_id).await?;

        let mut active: delivery_tracking::ActiveModel = delivery.clone().into();
        active.driver_id = Set(Some(driver_id));
        if delivery.status == DeliveryStatus::Pending {
            active.status = Set(DeliveryStatus::Assigned);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(delivery_id = %id, %driver_id, "driver assigned");
        if updated.status != delivery.status {
            self.event_sender
                .publish(Event::DeliveryStatusChanged {
                    delivery_id: id,
                    order_id: updated.purchase_order_id,
                    old_status: delivery.status,
                    new_status: updated.status,
                })
                .await;
        }
        Ok(updated)
    }

    /// Updates a delivery and, in the same transaction, its parent order.
    ///
    /// `in_transit` ships a pending or confirmed order; `delivered` delivers it.
    #[instrument(skip(self, request), fields(status = %request.status))]
    pub async fn update_status(
        &self,
        scope: Scope,
        id: Uuid,
        request: UpdateDeliveryStatusRequest,
    ) -> Result<delivery_tracking::Model, ServiceError> {
        request.validate()?;
        let next = request.status;

        let txn = self.db_pool.begin().await?;
        let delivery = find_delivery_in_scope(&txn, scope, id).await?;
        let previous = delivery.status;

        if previous == next && request.notes.is_none() {
            return Ok(delivery);
        }
        if previous.is_terminal() && previous != next {
            return Err(ServiceError::InvalidStatus(format!(
                "delivery {} is already {}",
                id, previous
            )));
        }
        if next == DeliveryStatus::Assigned && delivery.driver_id.is_none() {
            return Err(ServiceError::InvalidStatus(
                "assign a driver before marking the delivery assigned".into(),
            ));
        }

        let order = purchase_order::Entity::find_by_id(delivery.purchase_order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Purchase order", delivery.purchase_order_id))?;
        if order.status == PurchaseOrderStatus::Cancelled {
            warn!(delivery_id = %id, order_id = %order.id, "delivery update on cancelled order");
            return Err(ServiceError::InvalidStatus(format!(
                "order {} is cancelled",
                order.po_number
            )));
        }

        let now = Utc::now();
        let order_id = order.id;
        let order_before = order.status;
        let order_after = match next {
            DeliveryStatus::InTransit
                if matches!(
                    order_before,
                    PurchaseOrderStatus::Pending | PurchaseOrderStatus::Confirmed
                ) =>
            {
                PurchaseOrderStatus::Shipped
            }
            DeliveryStatus::Delivered => PurchaseOrderStatus::Delivered,
            _ => order_before,
        };

        let mut active: delivery_tracking::ActiveModel = delivery.into();
        active.status = Set(next);
        active.updated_at = Set(now);
        if next == DeliveryStatus::Delivered && previous != next {
            active.delivered_at = Set(Some(now));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        let updated = active.update(&txn).await?;

        if order_after != order_before {
            let mut order_active: purchase_order::ActiveModel = order.into();
            order_active.status = Set(order_after);
            order_active.updated_at = Set(now);
            if order_after == PurchaseOrderStatus::Delivered {
                order_active.delivered_at = Set(Some(now));
            }
            order_active.update(&txn).await?;
        }

        txn.commit().await?;

        if previous != next {
            info!(delivery_id = %id, from = %previous, to = %next, "delivery status changed");
            self.event_sender
                .publish(Event::DeliveryStatusChanged {
                    delivery_id: id,
                    order_id,
                    old_status: previous,
                    new_status: next,
                })
                .await;
        }
        if order_after != order_before {
            self.event_sender
                .publish(Event::OrderStatusChanged {
                    order_id,
                    old_status: order_before,
                    new_status: order_after,
                })
                .await;
        }

        Ok(updated)
    }

    /// Records the driver's current position
    #[instrument(skip(self, request))]
    pub async fn update_location(
        &self,
        scope: Scope,
        id: Uuid,
        request: UpdateLocationRequest,
    ) -> Result<delivery_tracking::Model, ServiceError> {
        request.validate()?;
        let db = &*self.db_pool;
        let delivery = find_delivery_in_scope(db, scope, id).await?;
        if delivery.status.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "delivery {} is already {}",
                id, delivery.status
            )));
        }

        let mut active: delivery_tracking::ActiveModel = delivery.into();
        active.current_latitude = Set(Some(request.latitude));
        active.current_longitude = Set(Some(request.longitude));
        if let Some(eta) = request.estimated_arrival {
            active.estimated_arrival = Set(Some(eta));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        info!(delivery_id = %id, latitude = request.latitude, longitude = request.longitude, "location updated");
        Ok(updated)
    }
}
