use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::models::{ReferralStats, DEFAULT_PRODUCT};
use crate::util::days_to_seconds;

/// Bonus granted per successful referral when the caller names no amount.
pub const DEFAULT_REFERRAL_DAYS: i64 = 3;

#[derive(Debug, Deserialize)]
pub struct ReferralRequest {
    pub referrer_id: String,
    pub referred_id: String,
    pub product: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReferralResponse {
    pub referrer_id: String,
    pub referred_id: String,
    pub product: String,
    pub days_awarded: i64,
    pub license_key: String,
    pub new_expiry: i64,
}

/// POST /referrals - award the referrer bonus days on their latest license.
/// One bonus per (referrer, referred, product) pair, ever.
pub async fn record_referral(
    State(state): State<AppState>,
    Json(req): Json<ReferralRequest>,
) -> Result<Json<ReferralResponse>> {
    if req.referrer_id == req.referred_id {
        return Err(AppError::BadRequest("cannot refer yourself".into()));
    }
    let days = req.days.unwrap_or(DEFAULT_REFERRAL_DAYS);
    if days <= 0 {
        return Err(AppError::BadRequest("days must be positive".into()));
    }
    let product = req.product.as_deref().unwrap_or(DEFAULT_PRODUCT);

    // The bonus lands on an existing license; no license, no award.
    if state
        .licenses
        .get_active_for_owner(&req.referrer_id, Some(product))?
        .is_none()
    {
        return Err(AppError::NotFound("no_subscription".into()));
    }

    let referral = state
        .referrals
        .record(&req.referrer_id, &req.referred_id, product, days)?
        .ok_or_else(|| AppError::Conflict("already_referred".into()))?;

    let (license_key, new_expiry) = state
        .licenses
        .extend_for_owner(&req.referrer_id, days_to_seconds(days as f64), Some(product))?
        .ok_or_else(|| {
            tracing::warn!(
                "referral {} recorded but referrer {} has no license left to extend",
                referral.id,
                req.referrer_id
            );
            AppError::Internal("referral recorded but no license to extend".into())
        })?;

    tracing::info!(
        "referral bonus: {} referred {} (+{} days on {})",
        req.referrer_id,
        req.referred_id,
        days,
        license_key
    );

    Ok(Json(ReferralResponse {
        referrer_id: req.referrer_id,
        referred_id: req.referred_id,
        product: product.to_string(),
        days_awarded: days,
        license_key,
        new_expiry,
    }))
}

/// GET /referrals/{owner_id} - how many referrals an owner has made and
/// the days they earned for them.
pub async fn referral_stats(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<ReferralStats>> {
    Ok(Json(state.referrals.stats(&owner_id)?))
}
