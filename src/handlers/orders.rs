use super::common::{
    created_response, no_content_response, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    auth::{AuthRouterExt, AuthUser, Role},
    entities::purchase_order,
    errors::{ApiError, ErrorResponse},
    handlers::AppState,
    services::orders::{
        CreateOrderRequest, OrderCreated, OrderDetail, OrderFilter, UpdateOrderStatusRequest,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use tracing::info;
use uuid::Uuid;

pub fn orders_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .with_auth();

    let create = Router::new()
        .route("/orders", post(create_order))
        .with_roles(&[Role::Admin, Role::Client]);

    let update = Router::new()
        .route("/orders/:id/status", put(update_order_status))
        .with_roles(&[Role::Admin, Role::Supplier]);

    let cancel = Router::new()
        .route("/orders/:id/cancel", post(cancel_order))
        .with_roles(&[Role::Admin, Role::Supplier, Role::Client]);

    let remove = Router::new()
        .route("/orders/:id", delete(delete_order))
        .with_roles(&[Role::Admin]);

    read.merge(create).merge(update).merge(cancel).merge(remove)
}

/// Place a purchase order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderCreated),
        (status = 400, description = "Invalid items or address", body = ErrorResponse),
        (status = 404, description = "Unknown supplier or product", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let created = state.services.orders.create_order(&user, payload).await?;
    info!(order_id = %created.id, po_number = %created.po_number, "order placed");
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderFilter, PaginationParams),
    responses(
        (status = 200, description = "Orders visible to the caller", body = PaginatedResponse<purchase_order::Model>)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<OrderFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = pagination.page_request(&state.config);
    let orders = state
        .services
        .orders
        .list_orders(user.scope()?, filter, page)
        .await?;
    Ok(success_response(PaginatedResponse::from(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Order with items", body = OrderDetail),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.orders.get_order(user.scope()?, id).await?;
    Ok(success_response(order))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = purchase_order::Model),
        (status = 400, description = "Invalid transition", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let order = state
        .services
        .orders
        .update_status(user.scope()?, id, payload)
        .await?;
    Ok(success_response(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Order cancelled", body = purchase_order::Model),
        (status = 400, description = "Order can no longer be cancelled", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .cancel_order(user.scope()?, id)
        .await?;
    Ok(success_response(order))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 409, description = "Order is in progress", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.orders.delete_order(id).await?;
    Ok(no_content_response())
}
