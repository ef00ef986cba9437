//! Tests for POST /redeem, which consumes a pending order and turns it
//! into a license for the claiming identity.

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

fn seed_order(state: &AppState, email: &str, product: &str, days: i64) {
    state
        .orders
        .create(&CreateOrder {
            email: email.to_string(),
            product: product.to_string(),
            days,
            order_number: Some("ORD-1".to_string()),
            customer_name: Some("Buyer Name".to_string()),
        })
        .expect("Failed to seed order");
}

#[tokio::test]
async fn test_redeem_creates_a_license() {
    let state = create_test_app_state();
    seed_order(&state, "buyer@example.com", "forge", 30);
    let app = service_app(state.clone());

    let before = now();
    let (status, body) = send(
        &app,
        service_post(
            "/redeem",
            &json!({ "email": "buyer@example.com", "owner_id": "1001" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product"], "forge");
    assert_eq!(body["days_granted"], 30);
    assert_eq!(body["created"], true);

    let expected = before + 30 * ONE_DAY;
    let new_expiry = body["new_expiry"].as_i64().unwrap();
    assert!((new_expiry - expected).abs() <= 2);

    let key = body["license_key"].as_str().unwrap();
    let stored = state.licenses.get(key).unwrap().expect("license was stored");
    assert_eq!(stored.owner_id, "1001");
    assert_eq!(
        stored.owner_name, "Buyer Name",
        "the storefront name carries over when the caller gives none"
    );
}

#[tokio::test]
async fn test_redeem_extends_an_existing_license() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "1001", "forge", future_timestamp(10));
    seed_order(&state, "buyer@example.com", "forge", 30);
    let app = service_app(state.clone());

    let (status, body) = send(
        &app,
        service_post(
            "/redeem",
            &json!({ "email": "buyer@example.com", "owner_id": "1001" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);
    assert_eq!(body["license_key"], license.license_key.as_str());
    assert_eq!(
        body["new_expiry"],
        license.expires_at + 30 * ONE_DAY,
        "a live license absorbs the grant on top of its expiry"
    );
    assert_eq!(state.licenses.list_for_owner("1001").unwrap().len(), 1);
}

#[tokio::test]
async fn test_redeem_without_matching_order_is_404() {
    let state = create_test_app_state();
    let app = service_app(state);

    let (status, body) = send(
        &app,
        service_post(
            "/redeem",
            &json!({ "email": "nobody@example.com", "owner_id": "1001" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["details"], "no_purchase_found");
}

#[tokio::test]
async fn test_redeem_consumes_the_order_exactly_once() {
    let state = create_test_app_state();
    seed_order(&state, "buyer@example.com", "forge", 30);
    let app = service_app(state);

    let (status, _) = send(
        &app,
        service_post(
            "/redeem",
            &json!({ "email": "buyer@example.com", "owner_id": "1001" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // A second claim, even from another identity, finds nothing.
    let (status, body) = send(
        &app,
        service_post(
            "/redeem",
            &json!({ "email": "buyer@example.com", "owner_id": "2002" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["details"], "no_purchase_found");
}

#[tokio::test]
async fn test_redeem_matches_email_case_insensitively() {
    let state = create_test_app_state();
    seed_order(&state, "Buyer@Example.COM", "forge", 30);
    let app = service_app(state);

    let (status, _) = send(
        &app,
        service_post(
            "/redeem",
            &json!({ "email": "buyer@example.com ", "owner_id": "1001" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_redeem_prefers_the_callers_owner_name() {
    let state = create_test_app_state();
    seed_order(&state, "buyer@example.com", "forge", 30);
    let app = service_app(state.clone());

    let (_, body) = send(
        &app,
        service_post(
            "/redeem",
            &json!({
                "email": "buyer@example.com",
                "owner_id": "1001",
                "owner_name": "Display Name"
            }),
        ),
    )
    .await;

    let key = body["license_key"].as_str().unwrap();
    let stored = state.licenses.get(key).unwrap().unwrap();
    assert_eq!(stored.owner_name, "Display Name");
}
