use super::common::{created_response, no_content_response, success_response, validate_input};
use crate::{
    auth::{AuthRouterExt, AuthUser, Role},
    entities::client_address,
    errors::{ApiError, ErrorResponse},
    handlers::AppState,
    services::addresses::{CreateAddressRequest, UpdateAddressRequest},
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
pub struct AddressListParams {
    /// Admin only: narrow to one client
    pub client_id: Option<Uuid>,
}

pub fn addresses_routes() -> Router<AppState> {
    Router::new()
        .route("/addresses", get(list_addresses).post(create_address))
        .route("/addresses/:id", put(update_address).delete(delete_address))
        .with_roles(&[Role::Admin, Role::Client])
}

#[utoipa::path(
    get,
    path = "/api/v1/addresses",
    params(AddressListParams),
    responses(
        (status = 200, description = "Delivery addresses", body = Vec<client_address::Model>)
    ),
    security(("bearer_auth" = [])),
    tag = "addresses"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<AddressListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let addresses = state
        .services
        .addresses
        .list_addresses(user.scope()?, params.client_id)
        .await?;
    Ok(success_response(addresses))
}

#[utoipa::path(
    post,
    path = "/api/v1/addresses",
    request_body = CreateAddressRequest,
    responses(
        (status = 201, description = "Address created", body = client_address::Model),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "addresses"
)]
pub async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let address = state
        .services
        .addresses
        .create_address(user.scope()?, payload)
        .await?;
    Ok(created_response(address))
}

#[utoipa::path(
    put,
    path = "/api/v1/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address ID")),
    request_body = UpdateAddressRequest,
    responses(
        (status = 200, description = "Address updated", body = client_address::Model),
        (status = 404, description = "Address not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "addresses"
)]
pub async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let address = state
        .services
        .addresses
        .update_address(user.scope()?, id, payload)
        .await?;
    Ok(success_response(address))
}

#[utoipa::path(
    delete,
    path = "/api/v1/addresses/{id}",
    params(("id" = Uuid, Path, description = "Address ID")),
    responses(
        (status = 204, description = "Address deleted"),
        (status = 404, description = "Address not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "addresses"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .addresses
        .delete_address(user.scope()?, id)
        .await?;
    Ok(no_content_response())
}
