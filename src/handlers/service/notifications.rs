use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::NotificationRecord;

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub limit: Option<i64>,
}

/// GET /notifications/pending - the out-of-process delivery loop's poll.
/// Records stay pending until explicitly settled, so a consumer crash only
/// means re-delivery.
pub async fn pending_notifications(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<NotificationRecord>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    Ok(Json(state.notifications.poll_pending(limit)?))
}

/// POST /notifications/{id}/delivered - terminal success, idempotent.
pub async fn notification_delivered(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    if !state.notifications.mark_delivered(id)? {
        return Err(AppError::NotFound(format!("notification {id} not found")));
    }
    Ok(Json(serde_json::json!({ "id": id, "delivered": true })))
}

#[derive(Debug, Deserialize)]
pub struct FailureReport {
    pub error: Option<String>,
}

/// POST /notifications/{id}/failed - count one failed delivery attempt.
pub async fn notification_failed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(report): Json<FailureReport>,
) -> Result<Json<NotificationRecord>> {
    let reason = report.error.as_deref().unwrap_or("delivery failed");
    if !state.notifications.mark_failed(id, reason)? {
        return Err(AppError::NotFound(format!(
            "no undelivered notification {id}"
        )));
    }
    let record = state
        .notifications
        .get(id)?
        .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))?;
    Ok(Json(record))
}

/// GET /notifications/failed - records that exhausted their attempts.
/// The operator's reconciliation view; nothing here is retried or deleted
/// automatically.
pub async fn failed_notifications(
    State(state): State<AppState>,
) -> Result<Json<Vec<NotificationRecord>>> {
    Ok(Json(state.notifications.failed()?))
}
