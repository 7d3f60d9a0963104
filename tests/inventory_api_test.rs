mod common;

use std::collections::HashSet;

use axum::http::{Method, StatusCode};
use bakery_api::auth::Role;
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn low_stock_lists_exactly_the_products_below_reorder_point() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;

    let short = app.seed_product(mill.id, "RYE-10", dec!(18.90), 4, 8).await;
    let shorter = app.seed_product(mill.id, "SEED-5", dec!(14.25), 0, 6).await;
    // at the reorder point is not low
    app.seed_product(mill.id, "FLR-25", dec!(31.50), 10, 10).await;
    app.seed_product(mill.id, "STARTER", dec!(6.00), 12, 5).await;

    let (status, body) = app
        .json(Method::GET, "/api/v1/products/low-stock", None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);

    let items = body.as_array().expect("low stock returns an array");
    let skus: HashSet<&str> = items.iter().filter_map(|p| p["sku"].as_str()).collect();
    assert_eq!(skus, HashSet::from(["RYE-10", "SEED-5"]));
    // largest shortfall first
    assert_eq!(items[0]["id"], json!(shorter.id));
    assert_eq!(items[1]["id"], json!(short.id));
}

#[tokio::test]
async fn supplier_sees_only_its_own_low_stock() {
    let app = TestApp::new().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let dairy = app.seed_supplier("Valley Dairy").await;
    app.seed_product(mill.id, "RYE-10", dec!(18.90), 1, 8).await;
    app.seed_product(dairy.id, "MILK-10", dec!(12.80), 1, 12).await;

    let supplier = app
        .create_user(Role::Supplier, "mill@bakery.test", Some(mill.id), None)
        .await;
    let token = app.token_for(&supplier);

    let (status, body) = app
        .json(Method::GET, "/api/v1/products/low-stock", None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let skus: Vec<&str> = body
        .as_array()
        .map(|items| items.iter().filter_map(|p| p["sku"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(skus, vec!["RYE-10"]);
}

#[tokio::test]
async fn stock_adjustment_applies_delta_and_refuses_negative_stock() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let flour = app.seed_product(mill.id, "FLR-25", dec!(31.50), 5, 10).await;
    let uri = format!("/api/v1/products/{}/stock", flour.id);

    let (status, body) = app
        .json(
            Method::PUT,
            &uri,
            Some(json!({ "delta": 20, "reason": "weekly delivery" })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock_quantity"], 25);

    let (status, _) = app
        .json(Method::PUT, &uri, Some(json!({ "delta": -26 })), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app
        .json(Method::GET, &format!("/api/v1/products/{}", flour.id), None, Some(&admin))
        .await;
    assert_eq!(body["stock_quantity"], 25);
}

#[tokio::test]
async fn product_list_is_paginated() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    for n in 0..5 {
        app.seed_product(mill.id, &format!("SKU-{n}"), dec!(1.00), 10, 1)
            .await;
    }

    let (status, body) = app
        .json(
            Method::GET,
            "/api/v1/products?page=2&per_page=2",
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["pagination"]["total"], 5);
    assert_eq!(body["pagination"]["total_pages"], 3);
    assert_eq!(body["pagination"]["page"], 2);
}

#[tokio::test]
async fn duplicate_sku_is_a_conflict() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    app.seed_product(mill.id, "FLR-25", dec!(31.50), 5, 10).await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "supplier_id": mill.id,
                "sku": "FLR-25",
                "name": "Another flour",
                "unit_price": "10.00",
                "stock_quantity": 1,
                "reorder_point": 0
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn page_numbers_past_the_end_return_an_empty_page() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    app.seed_product(mill.id, "FLR-25", dec!(31.50), 40, 10).await;

    for uri in [
        "/api/v1/orders?page=18446744073709551615",
        "/api/v1/products?page=18446744073709551615&per_page=2",
        "/api/v1/suppliers?page=9223372036854775807",
    ] {
        let (status, body) = app.json(Method::GET, uri, None, Some(&admin)).await;
        assert_eq!(status, StatusCode::OK, "{uri}: {body}");
        assert_eq!(body["data"].as_array().map(Vec::len), Some(0), "{uri}");
    }
}

#[tokio::test]
async fn suppliers_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let dairy = app.seed_supplier("Valley Dairy").await;
    let empty = app.seed_supplier("Closed Orchard").await;
    let flour = app.seed_product(mill.id, "FLR-25", dec!(31.50), 40, 10).await;
    app.seed_product(dairy.id, "BTR-5", dec!(42.00), 10, 2).await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "supplier_id": mill.id,
                "items": [{ "product_id": flour.id, "quantity": 1 }]
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // products only, and products with orders
    for supplier_id in [dairy.id, mill.id] {
        let (status, _) = app
            .json(
                Method::DELETE,
                &format!("/api/v1/suppliers/{supplier_id}"),
                None,
                Some(&admin),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/suppliers/{}", empty.id),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
