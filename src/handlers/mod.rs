pub mod addresses;
pub mod agents;
pub mod common;
pub mod dashboard;
pub mod deliveries;
pub mod drivers;
pub mod orders;
pub mod products;
pub mod suppliers;
pub mod users;

use crate::{
    agents::{AgentService, ChatCompletionProvider, ToolExecutor},
    auth::AuthService,
    db::DbPool,
    events::EventSender,
    services::{
        addresses::AddressService, dashboard::DashboardService, deliveries::DeliveryService,
        drivers::DriverService, orders::OrderService, products::ProductService,
        suppliers::SupplierService, users::UserService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub suppliers: Arc<SupplierService>,
    pub products: Arc<ProductService>,
    pub orders: Arc<OrderService>,
    pub deliveries: Arc<DeliveryService>,
    pub drivers: Arc<DriverService>,
    pub addresses: Arc<AddressService>,
    pub users: Arc<UserService>,
    pub dashboard: Arc<DashboardService>,
    pub agents: Arc<AgentService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
        llm: Option<Arc<dyn ChatCompletionProvider>>,
        agent_history_limit: usize,
    ) -> Self {
        let products = Arc::new(ProductService::new(db_pool.clone(), event_sender.clone()));
        let orders = Arc::new(OrderService::new(db_pool.clone(), event_sender.clone()));
        let deliveries = Arc::new(DeliveryService::new(db_pool.clone(), event_sender));
        let tools = ToolExecutor::new(orders.clone(), deliveries.clone(), products.clone());

        Self {
            suppliers: Arc::new(SupplierService::new(db_pool.clone())),
            drivers: Arc::new(DriverService::new(db_pool.clone())),
            addresses: Arc::new(AddressService::new(db_pool.clone())),
            users: Arc::new(UserService::new(db_pool.clone(), auth_service)),
            dashboard: Arc::new(DashboardService::new(db_pool, products.clone())),
            agents: Arc::new(AgentService::new(llm, tools, agent_history_limit)),
            products,
            orders,
            deliveries,
        }
    }
}
