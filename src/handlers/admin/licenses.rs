use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{License, DEFAULT_PRODUCT};
use crate::token::TokenClaims;
use crate::util::{days_to_seconds, now};

#[derive(Debug, Deserialize)]
pub struct IssueLicenseRequest {
    pub owner_id: String,
    pub owner_name: Option<String>,
    pub product: Option<String>,
    pub days: i64,
    /// Defer the countdown to the first verified use instead of starting
    /// it now.
    #[serde(default)]
    pub start_on_first_use: bool,
}

/// POST /admin/licenses - mint and store a new license. Key collisions are
/// retried inside the store with a fresh nonce.
pub async fn issue_license(
    State(state): State<AppState>,
    Json(req): Json<IssueLicenseRequest>,
) -> Result<Json<License>> {
    if req.days <= 0 {
        return Err(AppError::BadRequest("days must be positive".into()));
    }
    let product = req.product.as_deref().unwrap_or(DEFAULT_PRODUCT);
    let owner_name = req.owner_name.as_deref().unwrap_or(&req.owner_id);
    let pending_days = req.start_on_first_use.then_some(req.days);
    let expires_at = now() + days_to_seconds(req.days as f64);

    let license = state.licenses.issue(
        &state.codec,
        &req.owner_id,
        owner_name,
        product,
        expires_at,
        pending_days,
    )?;

    tracing::info!(
        "issued {} license to owner {} ({} days{})",
        product,
        req.owner_id,
        req.days,
        if req.start_on_first_use {
            ", deferred"
        } else {
            ""
        }
    );

    Ok(Json(license))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub product: Option<String>,
}

/// GET /admin/licenses?product= - all active licenses.
pub async fn list_licenses(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<License>>> {
    Ok(Json(state.licenses.list_active(query.product.as_deref())?))
}

#[derive(Debug, Serialize)]
pub struct LicenseInspection {
    pub license: License,
    /// What the key itself says when checked offline. Diverges from the row
    /// after server-side extensions, which is exactly what this surfaces.
    pub token: TokenInspection,
}

#[derive(Debug, Serialize)]
pub struct TokenInspection {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<TokenClaims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /admin/licenses/{key} - the stored row plus an offline decode of
/// the key.
pub async fn get_license(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<LicenseInspection>> {
    let license = state
        .licenses
        .get(&key)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let token = match state.codec.verify(&key) {
        Ok(claims) => TokenInspection {
            valid: true,
            claims: Some(claims),
            error: None,
        },
        Err(e) => TokenInspection {
            valid: false,
            claims: None,
            error: Some(e.to_string()),
        },
    };

    Ok(Json(LicenseInspection { license, token }))
}

#[derive(Debug, Deserialize)]
pub struct ExtendRequest {
    /// Fractional and negative day counts are both allowed; negative values
    /// shorten the license.
    pub days: f64,
}

#[derive(Debug, Serialize)]
pub struct ExtendResponse {
    pub license_key: String,
    pub new_expiry: i64,
}

/// POST /admin/licenses/{key}/extend - shift the expiry and clear any
/// revocation. Extending an expired license restarts it from now; reducing
/// subtracts from the stored expiry directly.
pub async fn extend_license(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<ExtendRequest>,
) -> Result<Json<ExtendResponse>> {
    if !req.days.is_finite() || req.days == 0.0 {
        return Err(AppError::BadRequest("days must be non-zero".into()));
    }
    let new_expiry = state
        .licenses
        .extend(&key, days_to_seconds(req.days))?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    tracing::info!("extended {} by {} days", key, req.days);

    Ok(Json(ExtendResponse {
        license_key: key,
        new_expiry,
    }))
}

/// POST /admin/licenses/{key}/revoke - expiry untouched, so a later extend
/// restores whatever time was left.
pub async fn revoke_license(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if !state.licenses.revoke(&key)? {
        return Err(AppError::NotFound("License not found".into()));
    }
    tracing::info!("revoked license {}", key);
    Ok(Json(serde_json::json!({ "license_key": key, "revoked": true })))
}

/// DELETE /admin/licenses/{key} - hard delete.
pub async fn delete_license(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if !state.licenses.delete(&key)? {
        return Err(AppError::NotFound("License not found".into()));
    }
    tracing::info!("deleted license {}", key);
    Ok(Json(serde_json::json!({ "license_key": key, "deleted": true })))
}

/// POST /admin/licenses/{key}/hwid/reset - detach the key from its bound
/// device so the next verified use binds fresh.
pub async fn reset_license_hwid(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if !state.binding.reset_by_key(&key)? {
        return Err(AppError::NotFound("License not found".into()));
    }
    Ok(Json(serde_json::json!({ "license_key": key, "reset": true })))
}
