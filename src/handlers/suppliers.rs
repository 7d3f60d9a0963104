use super::common::{
    created_response, no_content_response, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    auth::{AuthRouterExt, AuthUser, Role},
    entities::supplier,
    errors::{ApiError, ErrorResponse},
    handlers::AppState,
    services::suppliers::{CreateSupplierRequest, UpdateSupplierRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

pub fn suppliers_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/suppliers", get(list_suppliers))
        .route("/suppliers/:id", get(get_supplier))
        .with_roles(&[Role::Admin, Role::Supplier]);

    let write = Router::new()
        .route("/suppliers", post(create_supplier))
        .route("/suppliers/:id", put(update_supplier).delete(delete_supplier))
        .with_roles(&[Role::Admin]);

    read.merge(write)
}

#[utoipa::path(
    get,
    path = "/api/v1/suppliers",
    params(PaginationParams),
    responses(
        (status = 200, description = "Suppliers", body = PaginatedResponse<supplier::Model>),
        (status = 403, description = "Role not allowed", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "suppliers"
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = pagination.page_request(&state.config);
    let suppliers = state
        .services
        .suppliers
        .list_suppliers(user.scope()?, page)
        .await?;
    Ok(success_response(PaginatedResponse::from(suppliers)))
}

#[utoipa::path(
    get,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier", body = supplier::Model),
        (status = 404, description = "Supplier not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "suppliers"
)]
pub async fn get_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = state
        .services
        .suppliers
        .get_supplier(user.scope()?, id)
        .await?;
    Ok(success_response(supplier))
}

#[utoipa::path(
    post,
    path = "/api/v1/suppliers",
    request_body = CreateSupplierRequest,
    responses(
        (status = 201, description = "Supplier created", body = supplier::Model),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "suppliers"
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    Json(payload): Json<CreateSupplierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let supplier = state.services.suppliers.create_supplier(payload).await?;
    Ok(created_response(supplier))
}

#[utoipa::path(
    put,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    request_body = UpdateSupplierRequest,
    responses(
        (status = 200, description = "Supplier updated", body = supplier::Model),
        (status = 404, description = "Supplier not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "suppliers"
)]
pub async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSupplierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let supplier = state.services.suppliers.update_supplier(id, payload).await?;
    Ok(success_response(supplier))
}

#[utoipa::path(
    delete,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 204, description = "Supplier deleted"),
        (status = 409, description = "Supplier still has products or orders", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "suppliers"
)]
pub async fn delete_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.suppliers.delete_supplier(id).await?;
    Ok(no_content_response())
}
