//! Tests for the referral endpoints.

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_referral_awards_the_default_bonus() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "1001", "forge", future_timestamp(10));
    let app = service_app(state.clone());

    let (status, body) = send(
        &app,
        service_post(
            "/referrals",
            &json!({ "referrer_id": "1001", "referred_id": "2002" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["days_awarded"], 3);
    assert_eq!(body["license_key"], license.license_key.as_str());
    assert_eq!(
        body["new_expiry"],
        license.expires_at + 3 * ONE_DAY,
        "the bonus lands on the referrer's license"
    );
}

#[tokio::test]
async fn test_referral_with_explicit_days() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "1001", "forge", future_timestamp(10));
    let app = service_app(state);

    let (_, body) = send(
        &app,
        service_post(
            "/referrals",
            &json!({ "referrer_id": "1001", "referred_id": "2002", "days": 7 }),
        ),
    )
    .await;
    assert_eq!(body["days_awarded"], 7);
    assert_eq!(body["new_expiry"], license.expires_at + 7 * ONE_DAY);
}

#[tokio::test]
async fn test_referral_duplicate_pair_is_409() {
    let state = create_test_app_state();
    let license = create_test_license(&state, "1001", "forge", future_timestamp(10));
    let app = service_app(state.clone());

    let referral = json!({ "referrer_id": "1001", "referred_id": "2002" });
    let (status, _) = send(&app, service_post("/referrals", &referral)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, service_post("/referrals", &referral)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"], "already_referred");

    let stored = state.licenses.get(&license.license_key).unwrap().unwrap();
    assert_eq!(
        stored.expires_at,
        license.expires_at + 3 * ONE_DAY,
        "the duplicate must not award a second bonus"
    );
}

#[tokio::test]
async fn test_referral_requires_an_active_license() {
    let state = create_test_app_state();
    let app = service_app(state);

    let (status, body) = send(
        &app,
        service_post(
            "/referrals",
            &json!({ "referrer_id": "1001", "referred_id": "2002" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["details"], "no_subscription");
}

#[tokio::test]
async fn test_referral_self_referral_is_400() {
    let state = create_test_app_state();
    create_test_license(&state, "1001", "forge", future_timestamp(10));
    let app = service_app(state);

    let (status, _) = send(
        &app,
        service_post(
            "/referrals",
            &json!({ "referrer_id": "1001", "referred_id": "1001" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_referral_rejects_non_positive_days() {
    let state = create_test_app_state();
    create_test_license(&state, "1001", "forge", future_timestamp(10));
    let app = service_app(state);

    let (status, _) = send(
        &app,
        service_post(
            "/referrals",
            &json!({ "referrer_id": "1001", "referred_id": "2002", "days": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_referral_stats_endpoint() {
    let state = create_test_app_state();
    create_test_license(&state, "1001", "forge", future_timestamp(10));
    let app = service_app(state);

    send(
        &app,
        service_post(
            "/referrals",
            &json!({ "referrer_id": "1001", "referred_id": "2002" }),
        ),
    )
    .await;
    send(
        &app,
        service_post(
            "/referrals",
            &json!({ "referrer_id": "1001", "referred_id": "3003", "days": 5 }),
        ),
    )
    .await;

    let (status, body) = send(&app, service_get("/referrals/1001")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["days_awarded"], 8);

    let (_, body) = send(&app, service_get("/referrals/nobody")).await;
    assert_eq!(body["count"], 0);
}
