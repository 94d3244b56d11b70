mod common;

use axum::http::{Method, StatusCode};
use common::{admin_token, basket, mint_token, TestApp};
use delivery_orders_api::{models::OrderStatus, notifications::OrderEvent};
use serde_json::json;

#[tokio::test]
async fn customer_routes_require_a_valid_bearer_token() {
    let app = TestApp::new();
    let order = app.seed_order(Some("user-1"), basket()).await;
    let uri = format!("/api/v1/orders/{}", order.id);

    let (status, body) = app.request(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "common:unauthorized");

    let (status, _) = app
        .request(Method::GET, &uri, Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::GET, &uri, Some(&mint_token("user-1", None)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_probes_answer_without_auth() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");

    let (status, body) = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn create_order_attaches_callers_profile() {
    let app = TestApp::new();
    let profile = app.seed_profile("user-1", -34.60, -58.38);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&mint_token("user-1", None)),
            Some(json!({
                "eta": "20m",
                "items": [{ "name": "Milanesa", "unitPrice": "3200.50", "quantity": 1 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["userId"], "user-1");
    assert_eq!(body["profileId"], profile.id.to_string());
    assert_eq!(body["status"], "CREATED");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(&mint_token("user-1", None)),
            Some(json!({
                "eta": "20m",
                "items": [{ "name": "Milanesa", "unitPrice": "-1", "quantity": 1 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "common:validation-error");
}

#[tokio::test]
async fn admin_updates_status_and_notifies() {
    let app = TestApp::new();
    let order = app.seed_order(Some("user-1"), basket()).await;
    let mut events = app.subscribe();
    let uri = format!("/api/v1/admin/orders/{}", order.id);

    let (status, _) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&mint_token("user-1", None)),
            Some(json!({ "status": "DELIVERED" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&admin_token()),
            Some(json!({ "status": "on_the_way", "eta": "10m" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ON_THE_WAY");
    assert_eq!(body["statusIndex"], 3);
    assert_eq!(app.order(order.id).await.status, OrderStatus::OnTheWay);

    let event = tokio::time::timeout(std::time::Duration::from_secs(1), events.recv())
        .await
        .expect("update event delivered")
        .unwrap();
    assert_eq!(
        event,
        OrderEvent::OrderUpdated {
            order_id: order.id,
            status: OrderStatus::OnTheWay,
            eta: "10m".into(),
        }
    );

    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&admin_token()),
            Some(json!({ "status": "LOST" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "order:invalid-status");
}

#[tokio::test]
async fn settings_and_delivery_quote_are_public() {
    let app = TestApp::new();

    let (status, settings) = app.request(Method::GET, "/api/v1/settings", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["defaultItemWeightGrams"], 500);

    let (status, quote) = app
        .request(
            Method::POST,
            "/api/v1/settings/delivery-fee",
            None,
            Some(json!({
                "latitude": settings["businessLatitude"],
                "longitude": settings["businessLongitude"],
                "items": [{ "quantity": 2 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{quote}");
    assert_eq!(quote["totalWeightGrams"], 1000);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/settings/delivery-fee",
            None,
            Some(json!({ "latitude": 95.0, "longitude": 0.0, "items": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_delivery_quote_is_a_validation_error() {
    let app = TestApp::new();
    let heavy = json!({ "quantity": u32::MAX, "weightGrams": u32::MAX });

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/settings/delivery-fee",
            None,
            Some(json!({ "latitude": -34.6, "longitude": -58.4, "items": [heavy, heavy] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], "common:validation-error");
}
