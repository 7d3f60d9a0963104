use super::common::{
    created_response, no_content_response, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    auth::{AuthRouterExt, AuthUser, Role},
    entities::product,
    errors::{ApiError, ErrorResponse},
    handlers::AppState,
    services::products::{
        AdjustStockRequest, CreateProductRequest, ProductFilter, UpdateProductRequest,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

pub fn products_routes() -> Router<AppState> {
    let read = Router::new()
        .route("/products", get(list_products))
        .route("/products/low-stock", get(low_stock_products))
        .route("/products/:id", get(get_product))
        .with_auth();

    let write = Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
        .route("/products/:id/stock", put(adjust_stock))
        .with_roles(&[Role::Admin, Role::Supplier]);

    read.merge(write)
}

/// List products visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductFilter, PaginationParams),
    responses(
        (status = 200, description = "Products", body = PaginatedResponse<product::Model>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<ProductFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = pagination.page_request(&state.config);
    let products = state
        .services
        .products
        .list_products(user.scope()?, filter, page)
        .await?;
    Ok(success_response(PaginatedResponse::from(products)))
}

/// Products below their reorder point, largest shortfall first
#[utoipa::path(
    get,
    path = "/api/v1/products/low-stock",
    responses(
        (status = 200, description = "Low-stock products", body = Vec<product::Model>)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn low_stock_products(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let products = state.services.products.low_stock(user.scope()?).await?;
    Ok(success_response(products))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = product::Model),
        (status = 404, description = "Product not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_product(user.scope()?, id)
        .await?;
    Ok(success_response(product))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = product::Model),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Other supplier's product", body = ErrorResponse),
        (status = 409, description = "Duplicate SKU", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state
        .services
        .products
        .create_product(user.scope()?, payload)
        .await?;
    Ok(created_response(product))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = product::Model),
        (status = 404, description = "Product not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state
        .services
        .products
        .update_product(user.scope()?, id, payload)
        .await?;
    Ok(success_response(product))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 409, description = "Product is referenced by orders", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .products
        .delete_product(user.scope()?, id)
        .await?;
    Ok(no_content_response())
}

/// Apply a signed stock delta
#[utoipa::path(
    put,
    path = "/api/v1/products/{id}/stock",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = product::Model),
        (status = 400, description = "Stock would go negative", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state
        .services
        .products
        .adjust_stock(user.scope()?, id, payload)
        .await?;
    Ok(success_response(product))
}
