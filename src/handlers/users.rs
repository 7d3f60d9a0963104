use super::common::{
    created_response, success_response, validate_input, PaginatedResponse, PaginationParams,
};
use crate::{
    auth::{AuthRouterExt, Role},
    entities::user,
    errors::{ApiError, ErrorResponse},
    handlers::AppState,
    services::users::{CreateUserRequest, SetActiveRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct UserListParams {
    pub role: Option<Role>,
}

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id/active", put(set_user_active))
        .with_roles(&[Role::Admin])
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(UserListParams, PaginationParams),
    responses(
        (status = 200, description = "Users", body = PaginatedResponse<user::Model>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<UserListParams>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = pagination.page_request(&state.config);
    let users = state.services.users.list_users(params.role, page).await?;
    Ok(success_response(PaginatedResponse::from(users)))
}

/// Create an account of any role
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = user::Model),
        (status = 400, description = "Missing or unknown tenant id", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let user = state.services.users.create_user(payload).await?;
    info!(user_id = %user.id, role = %user.role, "user created by admin");
    Ok(created_response(user))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/active",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "User updated", body = user::Model),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn set_user_active(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .set_active(id, payload.is_active)
        .await?;
    Ok(success_response(user))
}
