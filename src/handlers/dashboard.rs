use super::common::success_response;
use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ApiError,
    handlers::AppState,
    services::dashboard::Dashboard,
};
use axum::{extract::State, response::IntoResponse, routing::get, Router};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .with_auth()
}

/// Role-specific summary for the caller
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Dashboard for the caller's role", body = Dashboard),
        (status = 401, description = "Not authenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "dashboard"
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.services.dashboard.summary(user.scope()?).await?;
    Ok(success_response(summary))
}
