use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{CreateNotification, CreateOrder, DEFAULT_PRODUCT};

use super::redeem::grant_days;

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub email: String,
    pub days: i64,
    pub product: Option<String>,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    /// Set when the storefront already knows the buyer's identity; the
    /// license materializes immediately instead of waiting for redemption.
    pub owner_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub status: &'static str,
    pub product: String,
    pub days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_expiry: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<i64>,
}

/// POST /purchases - entry point for the storefront adapter (payload
/// already verified and parsed upstream).
///
/// With an owner id the purchase becomes a license right away and a
/// delivery record is enqueued before the response goes out, so the event
/// survives a crash. Without one it is parked as a pending order for later
/// redemption.
pub async fn record_purchase(
    State(state): State<AppState>,
    Json(req): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>> {
    if req.days <= 0 {
        return Err(AppError::BadRequest("days must be positive".into()));
    }
    let product = req
        .product
        .clone()
        .unwrap_or_else(|| DEFAULT_PRODUCT.to_string());

    let Some(owner_id) = req.owner_id.as_deref() else {
        let order = state.orders.create(&CreateOrder {
            email: req.email.clone(),
            product: product.clone(),
            days: req.days,
            order_number: req.order_number.clone(),
            customer_name: req.customer_name.clone(),
        })?;
        tracing::info!(
            "recorded pending order {} ({} {} days)",
            order.id,
            order.product,
            order.days
        );
        return Ok(Json(PurchaseResponse {
            status: "order_recorded",
            product: order.product,
            days: order.days,
            license_key: None,
            new_expiry: None,
            created: None,
            order_id: Some(order.id),
            notification_id: None,
        }));
    };

    let owner_name = req.customer_name.as_deref().unwrap_or(owner_id);
    let (license_key, new_expiry, created) =
        grant_days(&state, owner_id, owner_name, &product, req.days)?;

    // Enqueued before responding: the notification must exist once the
    // storefront sees success, even if the process dies right after.
    let notification_id = state.notifications.enqueue(&CreateNotification {
        owner_id: owner_id.to_string(),
        license_key: license_key.clone(),
        product: product.clone(),
        expires_at: new_expiry,
        customer_name: req.customer_name.clone(),
        email: Some(req.email.clone()),
        order_number: req.order_number.clone(),
    })?;

    tracing::info!(
        "purchase materialized for owner {}: {} +{} days (notification {})",
        owner_id,
        product,
        req.days,
        notification_id
    );

    Ok(Json(PurchaseResponse {
        status: "license_granted",
        product,
        days: req.days,
        license_key: Some(license_key),
        new_expiry: Some(new_expiry),
        created: Some(created),
        order_id: None,
        notification_id: Some(notification_id),
    }))
}
