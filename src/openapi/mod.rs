use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bakery API",
        version = "0.3.0",
        description = r#"
# Bakery Ordering API

Ordering, inventory and delivery tracking for a bakery and its suppliers.

## Roles

- **admin**: sees and manages everything
- **supplier**: its own products and the purchase orders placed with it
- **driver**: its assigned deliveries
- **client**: its own orders and delivery addresses

## Authentication

Obtain a token from `/auth/login` and send it on every request:

```
Authorization: Bearer <your-jwt-token>
```

## Pagination

List endpoints accept `page` (default 1) and `per_page` (default 20, max 100).
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login, registration and the current account"),
        (name = "products", description = "Catalog and stock levels"),
        (name = "suppliers", description = "Supplier management"),
        (name = "orders", description = "Purchase orders"),
        (name = "deliveries", description = "Delivery tracking"),
        (name = "drivers", description = "Driver management"),
        (name = "addresses", description = "Client delivery addresses"),
        (name = "users", description = "Account administration"),
        (name = "dashboard", description = "Role-specific summaries"),
        (name = "agents", description = "Role-scoped chat assistants"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Auth
        crate::auth::login_handler,
        crate::auth::register_handler,
        crate::auth::me_handler,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::low_stock_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::adjust_stock,

        // Suppliers
        crate::handlers::suppliers::list_suppliers,
        crate::handlers::suppliers::get_supplier,
        crate::handlers::suppliers::create_supplier,
        crate::handlers::suppliers::update_supplier,
        crate::handlers::suppliers::delete_supplier,

        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::delete_order,

        // Deliveries
        crate::handlers::deliveries::create_delivery,
        crate::handlers::deliveries::list_deliveries,
        crate::handlers::deliveries::get_delivery,
        crate::handlers::deliveries::assign_driver,
        crate::handlers::deliveries::update_delivery_status,
        crate::handlers::deliveries::update_location,

        // Drivers
        crate::handlers::drivers::list_drivers,
        crate::handlers::drivers::get_driver,
        crate::handlers::drivers::create_driver,
        crate::handlers::drivers::update_driver,

        // Addresses
        crate::handlers::addresses::list_addresses,
        crate::handlers::addresses::create_address,
        crate::handlers::addresses::update_address,
        crate::handlers::addresses::delete_address,

        // Users
        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::set_user_active,

        // Dashboard and agents
        crate::handlers::dashboard::get_dashboard,
        crate::handlers::agents::chat,
        crate::handlers::agents::persona_chat,
        crate::handlers::agents::list_tools,

        // Health
        crate::health::health_check,
        crate::health::liveness_check,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::auth::Role,
            crate::entities::PurchaseOrderStatus,
            crate::entities::DeliveryStatus,
            crate::agents::ChatTurn,
            crate::agents::ChatRole,
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Bakery API"));
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/api/v1/agents/{persona}/chat"));
        assert!(json.contains("bearer_auth"));
    }
}
