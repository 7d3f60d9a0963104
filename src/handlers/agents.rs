use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use crate::{
    agents::{AgentReply, ChatRequest, Persona, ToolListing},
    auth::{role_allowed, AuthRouterExt, AuthUser},
    errors::{ApiError, ErrorResponse, ServiceError},
    handlers::common::success_response,
    AppState,
};

/// Agents API routes: role-scoped chat over the same data the REST API serves
pub fn agents_routes() -> Router<AppState> {
    Router::new()
        .route("/agents/chat", post(chat))
        .route("/agents/tools", get(list_tools))
        .route("/agents/:persona/chat", post(persona_chat))
        .with_auth()
}

/// Chat with the persona matching the caller's role
#[utoipa::path(
    post,
    path = "/api/v1/agents/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Agent reply", body = AgentReply),
        (status = 400, description = "Empty or oversized message", body = ErrorResponse),
        (status = 502, description = "LLM provider failed", body = ErrorResponse),
        (status = 503, description = "Agents not configured", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "agents"
)]
pub async fn chat(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let persona = Persona::from_role(user.role);
    let reply = state.services.agents.chat(&user, persona, request).await?;
    Ok(success_response(reply))
}

/// Chat with a named persona; admins may use any of them
#[utoipa::path(
    post,
    path = "/api/v1/agents/{persona}/chat",
    params(("persona" = Persona, Path, description = "owner, supplier, customer or driver")),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Agent reply", body = AgentReply),
        (status = 403, description = "Persona not available to this role", body = ErrorResponse),
        (status = 503, description = "Agents not configured", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "agents"
)]
pub async fn persona_chat(
    State(state): State<AppState>,
    user: AuthUser,
    Path(persona): Path<Persona>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !role_allowed(user.role, persona.allowed_roles()) {
        return Err(ServiceError::Forbidden(format!(
            "the {} agent is not available to {} users",
            persona, user.role
        ))
        .into());
    }
    let reply = state.services.agents.chat(&user, persona, request).await?;
    Ok(success_response(reply))
}

/// Tools the caller's agent can use
#[utoipa::path(
    get,
    path = "/api/v1/agents/tools",
    responses(
        (status = 200, description = "Tool listing", body = ToolListing)
    ),
    security(("bearer_auth" = [])),
    tag = "agents"
)]
pub async fn list_tools(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state
        .services
        .agents
        .list_tools(Persona::from_role(user.role));
    Ok(success_response(listing))
}
