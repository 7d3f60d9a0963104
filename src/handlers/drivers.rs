use super::common::{
    created_response, success_response, validate_input, PaginatedResponse, PaginationParams,
};
use crate::{
    auth::{AuthRouterExt, AuthUser, Role},
    entities::driver,
    errors::{ApiError, ErrorResponse},
    handlers::AppState,
    services::drivers::{CreateDriverRequest, UpdateDriverRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DriverListParams {
    /// Only drivers that can take deliveries
    #[serde(default)]
    pub active_only: bool,
}

pub fn drivers_routes() -> Router<AppState> {
    let admin = Router::new()
        .route("/drivers", get(list_drivers).post(create_driver))
        .route("/drivers/:id", put(update_driver))
        .with_roles(&[Role::Admin]);

    // the service narrows drivers to their own record
    let read = Router::new()
        .route("/drivers/:id", get(get_driver))
        .with_roles(&[Role::Admin, Role::Driver]);

    admin.merge(read)
}

#[utoipa::path(
    get,
    path = "/api/v1/drivers",
    params(DriverListParams, PaginationParams),
    responses(
        (status = 200, description = "Drivers", body = PaginatedResponse<driver::Model>)
    ),
    security(("bearer_auth" = [])),
    tag = "drivers"
)]
pub async fn list_drivers(
    State(state): State<AppState>,
    Query(params): Query<DriverListParams>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = pagination.page_request(&state.config);
    let drivers = state
        .services
        .drivers
        .list_drivers(params.active_only, page)
        .await?;
    Ok(success_response(PaginatedResponse::from(drivers)))
}

#[utoipa::path(
    get,
    path = "/api/v1/drivers/{id}",
    params(("id" = Uuid, Path, description = "Driver ID")),
    responses(
        (status = 200, description = "Driver", body = driver::Model),
        (status = 404, description = "Driver not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "drivers"
)]
pub async fn get_driver(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let driver = state
        .services
        .drivers
        .get_driver(user.scope()?, id)
        .await?;
    Ok(success_response(driver))
}

#[utoipa::path(
    post,
    path = "/api/v1/drivers",
    request_body = CreateDriverRequest,
    responses(
        (status = 201, description = "Driver created", body = driver::Model),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "drivers"
)]
pub async fn create_driver(
    State(state): State<AppState>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let driver = state.services.drivers.create_driver(payload).await?;
    Ok(created_response(driver))
}

#[utoipa::path(
    put,
    path = "/api/v1/drivers/{id}",
    params(("id" = Uuid, Path, description = "Driver ID")),
    request_body = UpdateDriverRequest,
    responses(
        (status = 200, description = "Driver updated", body = driver::Model),
        (status = 404, description = "Driver not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "drivers"
)]
pub async fn update_driver(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDriverRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let driver = state.services.drivers.update_driver(id, payload).await?;
    Ok(success_response(driver))
}
