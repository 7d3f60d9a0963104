mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};

#[tokio::test]
async fn health_endpoints_report_database_and_liveness() {
    let app = TestApp::new().await;

    let (status, body) = app.json(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"], "up");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let (status, body) = app.json(Method::GET, "/health/live", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alive"], true);

    let (status, body) = app.json(Method::GET, "/health/version", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn openapi_document_is_public() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Bakery API");
    assert!(body["paths"]["/api/v1/products/low-stock"].is_object());
    assert!(body["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health/live", None, None).await;
    let headers = response.headers();
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");

    // error bodies echo the request id
    let response = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response_json(response).await;
    assert_eq!(body["request_id"].as_str().map(str::to_string), request_id);
}

#[tokio::test]
async fn dashboard_is_tagged_with_the_callers_role() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, body) = app
        .json(Method::GET, "/api/v1/dashboard", None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
    assert_eq!(body["products"], 0);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = TestApp::new().await;
    let (status, _) = app.json(Method::GET, "/cakes", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
