mod common;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use bakery_api::{
    auth::Role,
    entities::{delivery_tracking, order_item, purchase_order, DeliveryStatus},
};
use chrono::Utc;
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, SqlErr,
};
use serde_json::json;
use uuid::Uuid;

fn id_of(value: &serde_json::Value) -> Uuid {
    value["id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("response carries an id")
}

async fn place_order(
    app: &TestApp,
    token: &str,
    supplier_id: Uuid,
    lines: &[(Uuid, i32)],
) -> Uuid {
    let items: Vec<_> = lines
        .iter()
        .map(|(product_id, quantity)| json!({ "product_id": product_id, "quantity": quantity }))
        .collect();
    let (status, order) = app
        .json(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "supplier_id": supplier_id, "items": items })),
            Some(token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body: {order}");
    id_of(&order)
}

async fn open_delivery(
    app: &TestApp,
    token: &str,
    order_id: Uuid,
) -> (StatusCode, serde_json::Value) {
    app.json(
        Method::POST,
        "/api/v1/deliveries",
        Some(json!({ "purchase_order_id": order_id })),
        Some(token),
    )
    .await
}

#[tokio::test]
async fn client_order_is_persisted_with_computed_total() {
    let app = TestApp::new().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let flour = app.seed_product(mill.id, "FLR-25", dec!(31.50), 40, 10).await;
    let rye = app.seed_product(mill.id, "RYE-10", dec!(18.90), 20, 5).await;
    let client = app.create_user(Role::Client, "cafe@bakery.test", None, None).await;
    let token = app.token_for(&client);

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "supplier_id": mill.id,
                "items": [
                    { "product_id": flour.id, "quantity": 2 },
                    { "product_id": rye.id, "quantity": 1 }
                ]
            })),
            Some(&token),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "body: {body}");
    assert_eq!(body["status"], "pending");
    let po_number = body["po_number"].as_str().unwrap_or_default();
    assert!(po_number.starts_with("PO-"), "unexpected po number {po_number}");
    let total = Decimal::from_str(body["total_amount"].as_str().unwrap_or("0")).unwrap();
    assert_eq!(total, dec!(81.90));

    let stored = purchase_order::Entity::find_by_id(id_of(&body))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("order row exists");
    assert_eq!(stored.client_id, Some(client.id));
    assert_eq!(stored.supplier_id, mill.id);
    assert_eq!(stored.total_amount, dec!(81.90));

    // the client can read its order back with line items
    let (status, detail) = app
        .json(
            Method::GET,
            &format!("/api/v1/orders/{}", stored.id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["items"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn order_rejects_products_from_another_supplier() {
    let app = TestApp::new().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let dairy = app.seed_supplier("Valley Dairy").await;
    let butter = app.seed_product(dairy.id, "BTR-5", dec!(42.00), 10, 2).await;
    let admin = app.admin_token().await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "supplier_id": mill.id,
                "items": [{ "product_id": butter.id, "quantity": 1 }]
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_requires_at_least_one_positive_line() {
    let app = TestApp::new().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let flour = app.seed_product(mill.id, "FLR-25", dec!(31.50), 40, 10).await;
    let admin = app.admin_token().await;

    for items in [json!([]), json!([{ "product_id": flour.id, "quantity": 0 }])] {
        let (status, _) = app
            .json(
                Method::POST,
                "/api/v1/orders",
                Some(json!({ "supplier_id": mill.id, "items": items })),
                Some(&admin),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn delivered_delivery_marks_order_delivered() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let flour = app.seed_product(mill.id, "FLR-25", dec!(31.50), 40, 10).await;
    let driver_id = app.seed_driver("Sam Ortiz").await;
    let driver = app
        .create_user(Role::Driver, "sam@bakery.test", None, Some(driver_id))
        .await;
    let driver_token = app.token_for(&driver);

    let (_, order) = app
        .json(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "supplier_id": mill.id,
                "items": [{ "product_id": flour.id, "quantity": 3 }]
            })),
            Some(&admin),
        )
        .await;
    let order_id = id_of(&order);

    let (status, delivery) = app
        .json(
            Method::POST,
            "/api/v1/deliveries",
            Some(json!({ "purchase_order_id": order_id, "driver_id": driver_id })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body: {delivery}");
    assert_eq!(delivery["status"], "assigned");
    let delivery_id = id_of(&delivery);

    let (status, _) = app
        .json(
            Method::PUT,
            &format!("/api/v1/deliveries/{delivery_id}/status"),
            Some(json!({ "status": "in_transit" })),
            Some(&driver_token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let shipped = purchase_order::Entity::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipped.status.to_string(), "shipped");

    let (status, done) = app
        .json(
            Method::PUT,
            &format!("/api/v1/deliveries/{delivery_id}/status"),
            Some(json!({ "status": "delivered", "notes": "left at the back door" })),
            Some(&driver_token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(done["delivered_at"].is_string());

    let delivered = purchase_order::Entity::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivered.status.to_string(), "delivered");
    assert!(delivered.delivered_at.is_some());

    // terminal orders cannot be cancelled
    let (status, _) = app
        .json(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_transitions_follow_the_order_lifecycle() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let flour = app.seed_product(mill.id, "FLR-25", dec!(31.50), 40, 10).await;

    let (_, order) = app
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
    let uri = format!("/api/v1/orders/{}/status", id_of(&order));

    // pending cannot jump straight to delivered
    let (status, _) = app
        .json(Method::PUT, &uri, Some(json!({ "status": "delivered" })), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .json(Method::PUT, &uri, Some(json!({ "status": "confirmed" })), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", id_of(&order)),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
}

#[tokio::test]
async fn order_lines_come_back_in_submitted_order() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let seeded = [
        app.seed_product(mill.id, "SED-5", dec!(14.25), 10, 1).await,
        app.seed_product(mill.id, "FLR-25", dec!(31.50), 10, 1).await,
        app.seed_product(mill.id, "RYE-10", dec!(18.90), 10, 1).await,
    ];
    let lines: Vec<(Uuid, i32)> = seeded.iter().map(|p| (p.id, 1)).collect();
    let order_id = place_order(&app, &admin, mill.id, &lines).await;

    let (status, detail) = app
        .json(Method::GET, &format!("/api/v1/orders/{order_id}"), None, Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = detail["items"].as_array().cloned().unwrap_or_default();
    let products: Vec<_> = items.iter().map(|i| i["product_id"].clone()).collect();
    let expected: Vec<_> = seeded.iter().map(|p| json!(p.id)).collect();
    assert_eq!(products, expected);
    let positions: Vec<_> = items.iter().map(|i| i["line_number"].clone()).collect();
    assert_eq!(positions, vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn an_order_has_at_most_one_active_delivery() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let flour = app.seed_product(mill.id, "FLR-25", dec!(31.50), 40, 10).await;
    let order_id = place_order(&app, &admin, mill.id, &[(flour.id, 2)]).await;

    let (status, first) = open_delivery(&app, &admin, order_id).await;
    assert_eq!(status, StatusCode::CREATED, "body: {first}");
    let (status, _) = open_delivery(&app, &admin, order_id).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // the schema refuses a second open row even when the service check is skipped
    let now = Utc::now();
    let err = delivery_tracking::ActiveModel {
        id: Set(Uuid::new_v4()),
        purchase_order_id: Set(order_id),
        driver_id: Set(None),
        status: Set(DeliveryStatus::Pending),
        current_latitude: Set(None),
        current_longitude: Set(None),
        estimated_arrival: Set(None),
        delivered_at: Set(None),
        notes: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*app.state.db)
    .await
    .expect_err("second active delivery row");
    assert!(matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(_))
    ));

    // once the first one fails a new one can be opened
    let (status, _) = app
        .json(
            Method::PUT,
            &format!("/api/v1/deliveries/{}/status", id_of(&first)),
            Some(json!({ "status": "failed", "notes": "van broke down" })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = open_delivery(&app, &admin, order_id).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn cancelling_an_order_fails_its_open_deliveries() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let flour = app.seed_product(mill.id, "FLR-25", dec!(31.50), 40, 10).await;
    let order_id = place_order(&app, &admin, mill.id, &[(flour.id, 1)]).await;
    let (_, delivery) = open_delivery(&app, &admin, order_id).await;
    let delivery_uri = format!("/api/v1/deliveries/{}", id_of(&delivery));

    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/cancel"),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = app.json(Method::GET, &delivery_uri, None, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");

    // the cancelled order accepts no further delivery updates
    for update in [
        json!({ "status": "in_transit" }),
        json!({ "status": "failed", "notes": "customer closed" }),
    ] {
        let (status, _) = app
            .json(
                Method::PUT,
                &format!("{delivery_uri}/status"),
                Some(update),
                Some(&admin),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn only_pending_or_cancelled_orders_can_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let mill = app.seed_supplier("Stone Ground Mill").await;
    let flour = app.seed_product(mill.id, "FLR-25", dec!(31.50), 40, 10).await;

    let pending = place_order(&app, &admin, mill.id, &[(flour.id, 1)]).await;
    let (status, _) = open_delivery(&app, &admin, pending).await;
    assert_eq!(status, StatusCode::CREATED);

    let confirmed = place_order(&app, &admin, mill.id, &[(flour.id, 1)]).await;
    let (status, _) = app
        .json(
            Method::PUT,
            &format!("/api/v1/orders/{confirmed}/status"),
            Some(json!({ "status": "confirmed" })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let shipped = place_order(&app, &admin, mill.id, &[(flour.id, 1)]).await;
    let (_, delivery) = open_delivery(&app, &admin, shipped).await;
    let (status, _) = app
        .json(
            Method::PUT,
            &format!("/api/v1/deliveries/{}/status", id_of(&delivery)),
            Some(json!({ "status": "in_transit" })),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    for order_id in [confirmed, shipped] {
        let (status, _) = app
            .json(Method::DELETE, &format!("/api/v1/orders/{order_id}"), None, Some(&admin))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    let response = app
        .request(Method::DELETE, &format!("/api/v1/orders/{pending}"), None, Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let db = &*app.state.db;
    assert!(purchase_order::Entity::find_by_id(pending)
        .one(db)
        .await
        .unwrap()
        .is_none());
    let lines = order_item::Entity::find()
        .filter(order_item::Column::PurchaseOrderId.eq(pending))
        .count(db)
        .await
        .unwrap();
    assert_eq!(lines, 0);
    let deliveries = delivery_tracking::Entity::find()
        .filter(delivery_tracking::Column::PurchaseOrderId.eq(pending))
        .count(db)
        .await
        .unwrap();
    assert_eq!(deliveries, 0);
}
