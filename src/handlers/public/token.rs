use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::binding::BindingCheck;
use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::util::{non_empty, now, version_at_least};

use super::verify::start_countdown;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub owner_id: String,
    pub product: String,
    pub hwid: Option<String>,
    pub client_version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub owner_name: String,
    pub expires_at: i64,
    pub product: String,
}

#[derive(Debug, Serialize)]
struct TokenDenial {
    reason: &'static str,
}

fn deny(status: StatusCode, reason: &'static str) -> Response {
    (status, Json(TokenDenial { reason })).into_response()
}

/// POST /token - mint a fresh self-contained token for a client that
/// authenticates by external identity instead of a stored key. The token's
/// embedded expiry mirrors the stored row at mint time, so offline checks
/// honor any extensions granted so far.
///
/// Unlike /verify this endpoint creates credentials: it never fails open,
/// and when a minimum client version is configured a missing version field
/// counts as outdated.
pub async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Response> {
    if let Some(min) = state.min_client_version.as_deref() {
        let current = non_empty(req.client_version.as_deref())
            .map(|v| version_at_least(v, min))
            .unwrap_or(false);
        if !current {
            return Ok(deny(StatusCode::UPGRADE_REQUIRED, "update_required"));
        }
    }

    let license = match state
        .licenses
        .get_latest_for_owner(&req.owner_id, Some(&req.product))?
    {
        Some(l) => l,
        None => return Ok(deny(StatusCode::NOT_FOUND, "no_subscription")),
    };

    if license.revoked {
        return Ok(deny(StatusCode::FORBIDDEN, "revoked"));
    }

    if !license.is_pending() && license.is_expired(now()) {
        return Ok(deny(StatusCode::FORBIDDEN, "expired"));
    }

    if let BindingCheck::Mismatch = state.binding.enforce(&license, req.hwid.as_deref())? {
        return Ok(deny(StatusCode::CONFLICT, "bound_elsewhere"));
    }

    // Minting live credentials counts as first use: a deferred countdown
    // starts here whether or not a fingerprint came along.
    let expires_at = start_countdown(&state, &license)?;

    let token = state
        .codec
        .issue_with_expiry(&req.owner_id, &license.owner_name, expires_at, None);

    tracing::debug!(
        "issued identity token for owner {} ({})",
        req.owner_id,
        license.product
    );

    Ok(Json(TokenResponse {
        token,
        owner_name: license.owner_name,
        expires_at,
        product: license.product,
    })
    .into_response())
}
