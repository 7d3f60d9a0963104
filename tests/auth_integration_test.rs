mod common;

use axum::http::{Method, StatusCode};
use bakery_api::auth::Role;
use common::{TestApp, TEST_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn register_then_login_then_me() {
    let app = TestApp::new().await;

    let (status, registered) = app
        .json(
            Method::POST,
            "/auth/register",
            Some(json!({
                "email": "cafe@bakery.test",
                "name": "Corner Cafe",
                "password": TEST_PASSWORD
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body: {registered}");
    assert_eq!(registered["user"]["role"], "client");
    assert_eq!(registered["token_type"], "Bearer");

    let (status, login) = app
        .json(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "cafe@bakery.test", "password": TEST_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = login["access_token"].as_str().unwrap_or_default().to_string();
    assert!(!token.is_empty());

    let (status, me) = app.json(Method::GET, "/auth/me", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "cafe@bakery.test");
    assert!(me.get("password_hash").is_none(), "hash must never be serialized");
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let app = TestApp::new().await;
    let body = json!({
        "email": "cafe@bakery.test",
        "name": "Corner Cafe",
        "password": TEST_PASSWORD
    });

    let (status, _) = app
        .json(Method::POST, "/auth/register", Some(body.clone()), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .json(Method::POST, "/auth/register", Some(body), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_password_and_inactive_accounts_cannot_log_in() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let client = app.create_user(Role::Client, "cafe@bakery.test", None, None).await;

    let (status, _) = app
        .json(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "cafe@bakery.test", "password": "not-the-password" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            Method::PUT,
            &format!("/api/v1/users/{}/active", client.id),
            Some(json!({ "is_active": false })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "cafe@bakery.test", "password": TEST_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_creates_supplier_account_bound_to_supplier() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;

    let (status, user) = app
        .json(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "email": "mill@bakery.test",
                "name": "Mill desk",
                "password": TEST_PASSWORD,
                "role": "supplier",
                "supplier_id": mill.id
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body: {user}");
    assert_eq!(user["supplier_id"], json!(mill.id));

    // a supplier account without its supplier is rejected
    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "email": "orphan@bakery.test",
                "name": "Orphan",
                "password": TEST_PASSWORD,
                "role": "supplier"
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deactivated_account_loses_access_with_its_existing_token() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let client = app.create_user(Role::Client, "cafe@bakery.test", None, None).await;
    let token = app.token_for(&client);

    let (status, _) = app
        .json(Method::GET, "/api/v1/orders", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let active_uri = format!("/api/v1/users/{}/active", client.id);
    let (status, _) = app
        .json(
            Method::PUT,
            &active_uri,
            Some(json!({ "is_active": false })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.json(Method::GET, "/auth/me", None, Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .json(Method::GET, "/api/v1/orders", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/addresses",
            Some(json!({ "label": "Cafe", "street": "12 Market Street", "city": "Portland" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // reactivation restores the same token
    let (status, _) = app
        .json(
            Method::PUT,
            &active_uri,
            Some(json!({ "is_active": true })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .json(Method::GET, "/api/v1/orders", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
}
