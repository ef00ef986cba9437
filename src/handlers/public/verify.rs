use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::binding::BindingCheck;
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::License;
use crate::token::has_token_shape;
use crate::util::{non_empty, now, version_at_least};

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub key: String,
    pub product: Option<String>,
    pub hwid: Option<String>,
    pub client_version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl VerifyResponse {
    fn denied(reason: &'static str) -> Self {
        Self {
            valid: false,
            reason,
            bound: None,
            expires_at: None,
        }
    }
}

/// GET /verify - the check client software runs on every launch.
///
/// Always answers 200 with `{valid, reason, ...}`. A storage failure fails
/// OPEN (`valid: true, reason: "db_error"`): locking paying users out over
/// a database hiccup costs more than letting a key slip through a check
/// that is re-run on the next launch. Mutating boundaries do the opposite.
pub async fn verify_license(
    State(state): State<AppState>,
    Query(req): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>> {
    match check(&state, &req) {
        Ok(resp) => Ok(Json(resp)),
        Err(e) if e.is_backend_unavailable() => {
            tracing::error!("verification backend unavailable, failing open: {}", e);
            Ok(Json(VerifyResponse {
                valid: true,
                reason: "db_error",
                bound: None,
                expires_at: None,
            }))
        }
        Err(e) => Err(e),
    }
}

fn check(state: &AppState, req: &VerifyQuery) -> Result<VerifyResponse> {
    if !has_token_shape(&req.key) {
        return Ok(VerifyResponse::denied("invalid_format"));
    }

    let license = match state.licenses.get(&req.key)? {
        Some(l) => l,
        None => return Ok(VerifyResponse::denied("not_found")),
    };

    if let Some(product) = non_empty(req.product.as_deref()) {
        if license.product != product {
            return Ok(VerifyResponse::denied("wrong_product"));
        }
    }

    if license.revoked {
        return Ok(VerifyResponse::denied("revoked"));
    }

    // Outdated clients are turned away before anything binds or activates.
    if let (Some(min), Some(presented)) = (
        state.min_client_version.as_deref(),
        non_empty(req.client_version.as_deref()),
    ) {
        if !version_at_least(presented, min) {
            return Ok(VerifyResponse::denied("update_required"));
        }
    }

    if !license.is_pending() && license.is_expired(now()) {
        return Ok(VerifyResponse {
            valid: false,
            reason: "expired",
            bound: None,
            expires_at: Some(license.expires_at),
        });
    }

    match state.binding.enforce(&license, req.hwid.as_deref())? {
        BindingCheck::Mismatch => Ok(VerifyResponse::denied("hwid_mismatch")),
        BindingCheck::Bound => {
            // First verified use. Binding doubles as activation for
            // licenses whose countdown was deferred to first use.
            let expires_at = start_countdown(state, &license)?;
            Ok(VerifyResponse {
                valid: true,
                reason: "activated",
                bound: Some(true),
                expires_at: Some(expires_at),
            })
        }
        BindingCheck::Matched | BindingCheck::Skipped => Ok(VerifyResponse {
            valid: true,
            reason: "active",
            bound: None,
            // A deferred countdown has no meaningful expiry yet.
            expires_at: (!license.is_pending()).then_some(license.expires_at),
        }),
    }
}

/// Start a deferred countdown, or report the already-running expiry.
pub(super) fn start_countdown(state: &AppState, license: &License) -> Result<i64> {
    if !license.is_pending() {
        return Ok(license.expires_at);
    }
    match state.licenses.activate_pending(&license.license_key)? {
        Some(expires_at) => Ok(expires_at),
        // Lost an activation race; the row already carries the real expiry.
        None => Ok(state
            .licenses
            .get(&license.license_key)?
            .map(|l| l.expires_at)
            .unwrap_or(license.expires_at)),
    }
}
