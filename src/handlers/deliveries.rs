use super::common::{
    created_response, success_response, validate_input, PaginatedResponse, PaginationParams,
};
use crate::{
    auth::{AuthRouterExt, AuthUser, Role},
    entities::delivery_tracking,
    errors::{ApiError, ErrorResponse},
    handlers::AppState,
    services::deliveries::{
        AssignDriverRequest, CreateDeliveryRequest, DeliveryFilter, UpdateDeliveryStatusRequest,
        UpdateLocationRequest,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

pub fn deliveries_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/deliveries", get(list_deliveries))
        .route("/deliveries/:id", get(get_delivery))
        .with_auth();

    let dispatch = Router::new()
        .route("/deliveries", post(create_delivery))
        .route("/deliveries/:id/assign", put(assign_driver))
        .with_roles(&[Role::Admin, Role::Supplier]);

    let status = Router::new()
        .route("/deliveries/:id/status", put(update_delivery_status))
        .with_roles(&[Role::Admin, Role::Supplier, Role::Driver]);

    let location = Router::new()
        .route("/deliveries/:id/location", put(update_location))
        .with_roles(&[Role::Admin, Role::Driver]);

    read.merge(dispatch).merge(status).merge(location)
}

/// Start tracking delivery of a purchase order
#[utoipa::path(
    post,
    path = "/api/v1/deliveries",
    request_body = CreateDeliveryRequest,
    responses(
        (status = 201, description = "Delivery created", body = delivery_tracking::Model),
        (status = 400, description = "Order is cancelled or delivered", body = ErrorResponse),
        (status = 409, description = "Order already has an active delivery", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "deliveries"
)]
pub async fn create_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let delivery = state
        .services
        .deliveries
        .create_delivery(user.scope()?, payload)
        .await?;
    Ok(created_response(delivery))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries",
    params(DeliveryFilter, PaginationParams),
    responses(
        (status = 200, description = "Deliveries visible to the caller", body = PaginatedResponse<delivery_tracking::Model>)
    ),
    security(("bearer_auth" = [])),
    tag = "deliveries"
)]
pub async fn list_deliveries(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<DeliveryFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = pagination.page_request(&state.config);
    let deliveries = state
        .services
        .deliveries
        .list_deliveries(user.scope()?, filter, page)
        .await?;
    Ok(success_response(PaginatedResponse::from(deliveries)))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/{id}",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery", body = delivery_tracking::Model),
        (status = 404, description = "Delivery not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "deliveries"
)]
pub async fn get_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let delivery = state
        .services
        .deliveries
        .get_delivery(user.scope()?, id)
        .await?;
    Ok(success_response(delivery))
}

#[utoipa::path(
    put,
    path = "/api/v1/deliveries/{id}/assign",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body = AssignDriverRequest,
    responses(
        (status = 200, description = "Driver assigned", body = delivery_tracking::Model),
        (status = 400, description = "Driver inactive or delivery finished", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "deliveries"
)]
pub async fn assign_driver(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignDriverRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let delivery = state
        .services
        .deliveries
        .assign_driver(user.scope()?, id, payload.driver_id)
        .await?;
    Ok(success_response(delivery))
}

/// Record a delivery status; `delivered` also completes the purchase order
#[utoipa::path(
    put,
    path = "/api/v1/deliveries/{id}/status",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body = UpdateDeliveryStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = delivery_tracking::Model),
        (status = 400, description = "Invalid transition", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "deliveries"
)]
pub async fn update_delivery_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let delivery = state
        .services
        .deliveries
        .update_status(user.scope()?, id, payload)
        .await?;
    Ok(success_response(delivery))
}

#[utoipa::path(
    put,
    path = "/api/v1/deliveries/{id}/location",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body = UpdateLocationRequest,
    responses(
        (status = 200, description = "Location recorded", body = delivery_tracking::Model),
        (status = 400, description = "Coordinates out of range", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "deliveries"
)]
pub async fn update_location(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let delivery = state
        .services
        .deliveries
        .update_location(user.scope()?, id, payload)
        .await?;
    Ok(success_response(delivery))
}
