use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::util::{days_to_seconds, now};

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// The claim the buyer purchased under, matched against pending orders.
    pub email: String,
    pub owner_id: String,
    pub owner_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub product: String,
    pub days_granted: i64,
    pub new_expiry: i64,
    pub license_key: String,
    /// False when the grant extended an existing license instead.
    pub created: bool,
}

/// POST /redeem - consume the oldest unclaimed order for an email and
/// materialize it as a license for the claiming identity. The claim itself
/// is exactly-once; everything after it is an ordinary grant.
pub async fn redeem_purchase(
    State(state): State<AppState>,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>> {
    let order = state
        .orders
        .claim_oldest(&req.email, &req.owner_id)?
        .ok_or_else(|| AppError::NotFound("no_purchase_found".into()))?;

    let owner_name = req
        .owner_name
        .as_deref()
        .or(order.customer_name.as_deref())
        .unwrap_or(&req.owner_id);

    let (license_key, new_expiry, created) =
        grant_days(&state, &req.owner_id, owner_name, &order.product, order.days)?;

    tracing::info!(
        "order {} redeemed by owner {}: {} +{} days",
        order.id,
        req.owner_id,
        order.product,
        order.days
    );

    Ok(Json(RedeemResponse {
        product: order.product,
        days_granted: order.days,
        new_expiry,
        license_key,
        created,
    }))
}

/// Extend the owner's existing license for the product, or issue a fresh
/// one. Returns (key, new expiry, created).
pub(super) fn grant_days(
    state: &AppState,
    owner_id: &str,
    owner_name: &str,
    product: &str,
    days: i64,
) -> Result<(String, i64, bool)> {
    let delta = days_to_seconds(days as f64);
    if let Some((key, expiry)) = state
        .licenses
        .extend_for_owner(owner_id, delta, Some(product))?
    {
        return Ok((key, expiry, false));
    }
    let license = state
        .licenses
        .issue(&state.codec, owner_id, owner_name, product, now() + delta, None)?;
    Ok((license.license_key, license.expires_at, true))
}
