use crate::{
    auth::{AuthUser, Role, Scope},
    db::DbPool,
    entities::{
        client_address, delivery_tracking, order_item, product, purchase_order, supplier,
        DeliveryStatus, PurchaseOrderStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{fetch_page, PageRequest, Paged},
};
use chrono::{NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub supplier_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "an order needs at least one item"))]
    pub items: Vec<OrderItemRequest>,
    pub delivery_address_id: Option<Uuid>,
    /// `YYYY-MM-DD`
    #[schema(value_type = Option<String>, format = Date, example = "2024-12-24")]
    pub expected_delivery_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Body returned by order creation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderCreated {
    pub id: Uuid,
    pub po_number: String,
    pub status: PurchaseOrderStatus,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: PurchaseOrderStatus,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, IntoParams)]
pub struct OrderFilter {
    pub status: Option<PurchaseOrderStatus>,
    pub supplier_id: Option<Uuid>,
}

/// An order with its lines
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: purchase_order::Model,
    pub items: Vec<order_item::Model>,
}

/// `PO-YYYYMMDD-XXXXXX`, suffix is upper-case alphanumeric
pub fn generate_po_number(date: NaiveDate) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("PO-{}-{}", date.format("%Y%m%d"), suffix)
}

/// Tenant filter for purchase orders
pub(crate) fn order_scope_condition(scope: Scope) -> Condition {
    match scope {
        Scope::All => Condition::all(),
        Scope::Supplier(id) => Condition::all().add(purchase_order::Column::SupplierId.eq(id)),
        Scope::Client(user_id) => {
            Condition::all().add(purchase_order::Column::ClientId.eq(user_id))
        }
        Scope::Driver(driver_id) => Condition::all().add(
            purchase_order::Column::Id.in_subquery(
                Query::select()
                    .column(delivery_tracking::Column::PurchaseOrderId)
                    .from(delivery_tracking::Entity)
                    .and_where(delivery_tracking::Column::DriverId.eq(driver_id))
                    .to_owned(),
            ),
        ),
    }
}

/// Loads an order visible to `scope`; anything else is reported as missing
pub(crate) async fn find_order_in_scope<C: ConnectionTrait>(
    db: &C,
    scope: Scope,
    id: Uuid,
) -> Result<purchase_order::Model, ServiceError> {
    purchase_order::Entity::find_by_id(id)
        .filter(order_scope_condition(scope))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Purchase order", id))
}

/// Purchase order lifecycle
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates an order and its lines in one transaction.
    ///
    /// Unit prices are copied from the products at creation time.
    #[instrument(skip(self, actor, request), fields(actor = %actor.user_id, supplier_id = %request.supplier_id))]
    pub async fn create_order(
        &self,
        actor: &AuthUser,
        request: CreateOrderRequest,
    ) -> Result<OrderCreated, ServiceError> {
        request.validate()?;
        if let Some(bad) = request.items.iter().find(|item| item.quantity < 1) {
            return Err(ServiceError::ValidationError(format!(
                "quantity for product {} must be at least 1",
                bad.product_id
            )));
        }

        let client_id = match actor.role {
            Role::Client => Some(actor.user_id),
            Role::Admin => None,
            Role::Supplier | Role::Driver => {
                return Err(ServiceError::Forbidden("role cannot place orders".into()))
            }
        };

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "failed to start transaction for order creation");
            ServiceError::from(e)
        })?;

        let supplier = supplier::Entity::find_by_id(request.supplier_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Supplier", request.supplier_id))?;
        if !supplier.is_active {
            return Err(ServiceError::InvalidInput(format!(
                "supplier {} is not accepting orders",
                supplier.id
            )));
        }

        // Admin orders placed for a client inherit the address owner.
        let client_id = match request.delivery_address_id {
            Some(address_id) => {
                let address = client_address::Entity::find_by_id(address_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InvalidInput(format!(
                            "delivery address {} does not exist",
                            address_id
                        ))
                    })?;
                if client_id.is_some_and(|id| id != address.client_id) {
                    return Err(ServiceError::InvalidInput(
                        "delivery address belongs to another client".into(),
                    ));
                }
                Some(address.client_id)
            }
            None => client_id,
        };

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let mut lines = Vec::with_capacity(request.items.len());
        let mut total = Decimal::ZERO;

        for (position, item) in request.items.iter().enumerate() {
            let product = product::Entity::find_by_id(item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Product", item.product_id))?;

            if product.supplier_id != supplier.id {
                return Err(ServiceError::InvalidInput(format!(
                    "product {} is not sold by supplier {}",
                    product.id, supplier.id
                )));
            }
            if !product.is_active {
                return Err(ServiceError::InvalidInput(format!(
                    "product {} is not available",
                    product.id
                )));
            }

            let line_total = product.unit_price * Decimal::from(item.quantity);
            total += line_total;
            lines.push(order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                purchase_order_id: Set(order_id),
                product_id: Set(product.id),
                quantity: Set(item.quantity),
                unit_price: Set(product.unit_price),
                line_total: Set(line_total),
                line_number: Set(position as i32 + 1),
                created_at: Set(now),
            });
        }

        let po_number = Self::unique_po_number(&txn, now.date_naive()).await?;

        let order = purchase_order::ActiveModel {
            id: Set(order_id),
            po_number: Set(po_number.clone()),
            supplier_id: Set(supplier.id),
            client_id: Set(client_id),
            delivery_address_id: Set(request.delivery_address_id),
            status: Set(PurchaseOrderStatus::Pending),
            total_amount: Set(total),
            expected_delivery_date: Set(request.expected_delivery_date),
            delivered_at: Set(None),
            notes: Set(request.notes),
            created_by: Set(Some(actor.user_id)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        order.insert(&txn).await.map_err(|e| {
            error!(error = %e, %order_id, "failed to insert purchase order");
            ServiceError::from(e)
        })?;

        order_item::Entity::insert_many(lines).exec(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, %order_id, "failed to commit order creation");
            ServiceError::from(e)
        })?;

        info!(%order_id, %po_number, total_amount = %total, "purchase order created");
        self.event_sender
            .publish(Event::OrderCreated {
                order_id,
                supplier_id: supplier.id,
                total_amount: total,
            })
            .await;

        Ok(OrderCreated {
            id: order_id,
            po_number,
            status: PurchaseOrderStatus::Pending,
            total_amount: total,
        })
    }

    async fn unique_po_number(txn: &DatabaseTransaction, date: NaiveDate) -> Result<String, ServiceError> {
        for _ in 0..5 {
            let candidate = generate_po_number(date);
            let exists = purchase_order::Entity::find()
                .filter(purchase_order::Column::PoNumber.eq(candidate.as_str()))
                .one(txn)
                .await?
                .is_some();
            if !exists {
                return Ok(candidate);
            }
        }
        Err(ServiceError::InternalError(
            "could not allocate a unique po_number".into(),
        ))
    }

    /// Scoped listing, newest first
    pub async fn list_orders(
        &self,
        scope: Scope,
        filter: OrderFilter,
        page: PageRequest,
    ) -> Result<Paged<purchase_order::Model>, ServiceError> {
        let mut query = purchase_order::Entity::find()
            .filter(order_scope_condition(scope))
            .order_by_desc(purchase_order::Column::CreatedAt);
        if let Some(status) = filter.status {
            query = query.filter(purchase_order::Column::Status.eq(status));
        }
        if let Some(supplier_id) = filter.supplier_id {
            query = query.filter(purchase_order::Column::SupplierId.eq(supplier_id));
        }
        fetch_page(&*self.db_pool, query, page).await
    }

    pub async fn get_order(&self, scope: Scope, id: Uuid) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db_pool;
        let order = find_order_in_scope(db, scope, id).await?;
        let items = order_item::Entity::find()
            .filter(order_item::Column::PurchaseOrderId.eq(id))
            .order_by_asc(order_item::Column::LineNumber)
            .order_by_asc(order_item::Column::Id)
            .all(db)
            .await?;
        Ok(OrderDetail { order, items })
    }

    /// Moves an order along its lifecycle
    #[instrument(skip(self, request), fields(status = %request.status))]
    pub async fn update_status(
        &self,
        scope: Scope,
        id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<purchase_order::Model, ServiceError> {
        request.validate()?;
        self.transition(scope, id, request.status, request.notes).await
    }

    /// Cancels a pending or confirmed order and fails its open deliveries
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        scope: Scope,
        id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        self.transition(scope, id, PurchaseOrderStatus::Cancelled, None)
            .await
    }

    async fn transition(
        &self,
        scope: Scope,
        id: Uuid,
        next: PurchaseOrderStatus,
        notes: Option<String>,
    ) -> Result<purchase_order::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = find_order_in_scope(&txn, scope, id).await?;
        let previous = order.status;

        if !previous.can_transition_to(next) {
            warn!(order_id = %id, from = %previous, to = %next, "rejected order transition");
            return Err(ServiceError::InvalidStatus(format!(
                "cannot move order {} from {} to {}",
                order.po_number, previous, next
            )));
        }
        if previous == next && notes.is_none() {
            return Ok(order);
        }

        let now = Utc::now();
        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(next);
        active.updated_at = Set(now);
        if next == PurchaseOrderStatus::Delivered && previous != next {
            active.delivered_at = Set(Some(now));
        }
        if let Some(notes) = notes {
            active.notes = Set(Some(notes));
        }
        let updated = active.update(&txn).await?;

        if next == PurchaseOrderStatus::Cancelled && previous != next {
            delivery_tracking::Entity::update_many()
                .col_expr(
                    delivery_tracking::Column::Status,
                    sea_orm::sea_query::Expr::value(DeliveryStatus::Failed),
                )
                .col_expr(
                    delivery_tracking::Column::UpdatedAt,
                    sea_orm::sea_query::Expr::value(now),
                )
                .filter(delivery_tracking::Column::PurchaseOrderId.eq(id))
                .filter(delivery_tracking::Column::Status.is_in(DeliveryStatus::active_statuses()))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        if previous != next {
            info!(order_id = %id, from = %previous, to = %next, "purchase order status changed");
            self.event_sender
                .publish(Event::OrderStatusChanged {
                    order_id: id,
                    old_status: previous,
                    new_status: next,
                })
                .await;
        }
        Ok(updated)
    }

    /// Removes a pending or cancelled order with its lines and deliveries
    #[instrument(skip(self))]
    pub async fn delete_order(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;
        let order = find_order_in_scope(&txn, Scope::All, id).await?;

        if !matches!(
            order.status,
            PurchaseOrderStatus::Pending | PurchaseOrderStatus::Cancelled
        ) {
            return Err(ServiceError::Conflict(format!(
                "order {} is {} and cannot be deleted",
                order.po_number, order.status
            )));
        }

        delivery_tracking::Entity::delete_many()
            .filter(delivery_tracking::Column::PurchaseOrderId.eq(id))
            .exec(&txn)
            .await?;
        order_item::Entity::delete_many()
            .filter(order_item::Column::PurchaseOrderId.eq(id))
            .exec(&txn)
            .await?;
        purchase_order::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(order_id = %id, "purchase order deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn po_number_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let po = generate_po_number(date);
        assert!(po.starts_with("PO-20240309-"), "{}", po);
        let suffix = &po["PO-20240309-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
