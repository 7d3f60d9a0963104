//! Bakery API Library
//!
//! Ordering, inventory and delivery tracking for a bakery, its suppliers,
//! drivers and clients, plus role-scoped chat agents over the same data.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod agents;
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{http::HeaderValue, routing::get, Extension, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::agents::ChatCompletionProvider;
use crate::auth::AuthService;
use crate::events::EventSender;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<EventSender>,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires every service over one pool and one event channel.
    /// `llm` is `None` when no API key is configured.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Arc<EventSender>,
        auth: Arc<AuthService>,
        llm: Option<Arc<dyn ChatCompletionProvider>>,
    ) -> Self {
        let services = handlers::AppServices::new(
            db.clone(),
            event_sender.clone(),
            auth.clone(),
            llm,
            config.agent_history_limit,
        );
        Self {
            db,
            config,
            event_sender,
            auth,
            services,
        }
    }
}

/// Everything mounted under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::products::products_routes())
        .merge(handlers::suppliers::suppliers_routes())
        .merge(handlers::orders::orders_routes())
        .merge(handlers::deliveries::deliveries_routes())
        .merge(handlers::drivers::drivers_routes())
        .merge(handlers::addresses::addresses_routes())
        .merge(handlers::users::users_routes())
        .merge(handlers::dashboard::dashboard_routes())
        .merge(handlers::agents::agents_routes())
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    match configured_origins {
        Some(origins) => CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
        None => {
            // config validation only lets this through in development or with an explicit opt-in
            ::tracing::info!(
                development = cfg.is_development(),
                "Using permissive CORS because explicit origins were not configured"
            );
            CorsLayer::permissive()
        }
    }
}

/// Full application router with the shared middleware stack
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let timeout = state.config.request_timeout();
    let auth_service = state.auth.clone();
    let db = state.db.clone();

    Router::<AppState>::new()
        .route("/", get(|| async { "bakery-api up" }))
        .nest("/api/v1", api_v1_routes())
        .nest("/auth", auth::auth_routes().with_state(auth_service.clone()))
        .with_state(state)
        .nest("/health", health::health_routes(db))
        .merge(openapi::openapi_routes())
        .layer(axum::middleware::from_fn(
            middleware_helpers::security_headers_middleware,
        ))
        .layer(TimeoutLayer::new(timeout))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // Inject AuthService into request extensions for auth middleware
        .layer(Extension(auth_service))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}

pub mod prelude {
    pub use crate::agents::{AgentReply, ChatRequest, Persona};
    pub use crate::auth::{AuthUser, Role, Scope};
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::services::*;
    pub use crate::{build_router, AppState};
}
