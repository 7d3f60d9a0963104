#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use bakery_api::{
    agents::{ChatCompletionProvider, ChatMessage},
    auth::{AuthConfig, AuthService, Role, Scope},
    config::AppConfig,
    db::{self, DbConfig},
    entities::{product, supplier, user},
    errors::ServiceError,
    events::{self, EventSender},
    services::{
        drivers::CreateDriverRequest,
        products::CreateProductRequest,
        suppliers::CreateSupplierRequest,
        users::CreateUserRequest,
    },
    AppState,
};

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// LLM stand-in that records every prompt and answers with a fixed reply.
#[derive(Default)]
pub struct StubProvider {
    pub reply: String,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl StubProvider {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn last_prompt(&self) -> Vec<ChatMessage> {
        self.calls
            .lock()
            .expect("stub lock poisoned")
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatCompletionProvider for StubProvider {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ServiceError> {
        self.calls.lock().expect("stub lock poisoned").push(messages);
        Ok(self.reply.clone())
    }
}

/// Full application router over a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    pub async fn with_provider(provider: Arc<dyn ChatCompletionProvider>) -> Self {
        Self::build(Some(provider)).await
    }

    async fn build(llm: Option<Arc<dyn ChatCompletionProvider>>) -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "test".to_string(),
        );

        // one connection, otherwise each pooled connection gets its own empty database
        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_sender, event_rx) = EventSender::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(
            AuthConfig::from(&cfg).with_hash_cost(1024, 1),
            db_arc.clone(),
        ));

        let state = AppState::new(db_arc, cfg, Arc::new(event_sender), auth_service, llm);
        let router = bakery_api::build_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Request and decode the JSON body in one go.
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    pub async fn create_user(
        &self,
        role: Role,
        email: &str,
        supplier_id: Option<Uuid>,
        driver_id: Option<Uuid>,
    ) -> user::Model {
        self.state
            .services
            .users
            .create_user(CreateUserRequest {
                email: email.to_string(),
                name: format!("{} user", role),
                password: TEST_PASSWORD.to_string(),
                role,
                supplier_id,
                driver_id,
            })
            .await
            .expect("seed user for tests")
    }

    /// Bearer token for an already stored user.
    pub fn token_for(&self, user: &user::Model) -> String {
        self.state
            .auth
            .issue_token(user)
            .expect("issue token for tests")
            .access_token
    }

    pub async fn admin_token(&self) -> String {
        let admin = self
            .create_user(Role::Admin, "owner@bakery.test", None, None)
            .await;
        self.token_for(&admin)
    }

    pub async fn seed_supplier(&self, name: &str) -> supplier::Model {
        self.state
            .services
            .suppliers
            .create_supplier(CreateSupplierRequest {
                name: name.to_string(),
                contact_name: None,
                email: None,
                phone: None,
                address: None,
            })
            .await
            .expect("seed supplier for tests")
    }

    pub async fn seed_product(
        &self,
        supplier_id: Uuid,
        sku: &str,
        price: Decimal,
        stock: i32,
        reorder_point: i32,
    ) -> product::Model {
        self.state
            .services
            .products
            .create_product(
                Scope::All,
                CreateProductRequest {
                    supplier_id: Some(supplier_id),
                    sku: sku.to_string(),
                    name: format!("Product {}", sku),
                    description: None,
                    category: Some("flour".to_string()),
                    unit: None,
                    unit_price: price,
                    stock_quantity: stock,
                    reorder_point,
                },
            )
            .await
            .expect("seed product for tests")
    }

    pub async fn seed_driver(&self, name: &str) -> Uuid {
        self.state
            .services
            .drivers
            .create_driver(CreateDriverRequest {
                name: name.to_string(),
                phone: None,
                vehicle_description: None,
                license_number: None,
            })
            .await
            .expect("seed driver for tests")
            .id
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
