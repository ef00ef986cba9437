use axum::extract::State;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};

/// POST /admin/owners/{owner_id}/revoke - revoke every license the owner
/// holds. Idempotent; reports how many rows were touched.
pub async fn revoke_owner(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let revoked = state.licenses.revoke_all_for_owner(&owner_id)?;
    tracing::info!("revoked {} licenses for owner {}", revoked, owner_id);
    Ok(Json(
        serde_json::json!({ "owner_id": owner_id, "revoked": revoked }),
    ))
}

/// DELETE /admin/owners/{owner_id} - hard-delete every license the owner
/// holds.
pub async fn delete_owner(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let deleted = state.licenses.delete_all_for_owner(&owner_id)?;
    tracing::info!("deleted {} licenses for owner {}", deleted, owner_id);
    Ok(Json(
        serde_json::json!({ "owner_id": owner_id, "deleted": deleted }),
    ))
}

/// POST /admin/owners/{owner_id}/hwid/reset - detach all of the owner's
/// licenses from their bound devices.
pub async fn reset_owner_hwid(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let reset = state.binding.reset_by_owner(&owner_id)?;
    Ok(Json(
        serde_json::json!({ "owner_id": owner_id, "reset": reset }),
    ))
}
