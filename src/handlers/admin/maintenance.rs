use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::{DuplicateCleanup, LicenseStats};

#[derive(Debug, Default, Deserialize)]
pub struct ResetAllRequest {
    pub product: Option<String>,
}

/// POST /admin/hwid/reset-all - detach every bound license, optionally
/// scoped to one product. The blunt instrument for client-update days when
/// fingerprints change en masse.
pub async fn reset_all_hwids(
    State(state): State<AppState>,
    Json(req): Json<ResetAllRequest>,
) -> Result<Json<serde_json::Value>> {
    let reset = state.binding.reset_all(req.product.as_deref())?;
    tracing::info!(
        "reset hwid on {} licenses{}",
        reset,
        req.product
            .as_deref()
            .map(|p| format!(" ({p})"))
            .unwrap_or_default()
    );
    Ok(Json(serde_json::json!({ "reset": reset })))
}

/// POST /admin/duplicates/cleanup - collapse each (owner, product) group
/// that accumulated more than one live license down to the one with the
/// latest expiry. Reports exactly what was kept and removed.
pub async fn cleanup_duplicates(
    State(state): State<AppState>,
) -> Result<Json<DuplicateCleanup>> {
    Ok(Json(state.licenses.reset_duplicates()?))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub product: Option<String>,
}

/// GET /admin/stats?product= - license counts. Active, expired and revoked
/// always partition the total exactly.
pub async fn license_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<LicenseStats>> {
    Ok(Json(state.licenses.stats(query.product.as_deref())?))
}
