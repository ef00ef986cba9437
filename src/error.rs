use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Duplicate license key: {0}")]
    DuplicateKey(String),

    #[error("Insufficient balance: requested {requested_days} days, {available_days} available")]
    InsufficientBalance {
        requested_days: f64,
        available_days: f64,
    },

    #[error("Exchange rollback failed for {source_key} while crediting {target_product}")]
    RollbackFailed {
        source_key: String,
        target_product: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the failure came from the storage layer rather than the
    /// request itself. The verification boundary fails open on these;
    /// every mutating boundary propagates them.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Pool(_))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::DuplicateKey(key) => {
                (StatusCode::CONFLICT, "Duplicate key", Some(key.clone()))
            }
            AppError::InsufficientBalance {
                requested_days,
                available_days,
            } => (
                StatusCode::BAD_REQUEST,
                "Insufficient balance",
                Some(format!(
                    "requested {requested_days:.2} days, {available_days:.2} available"
                )),
            ),
            AppError::RollbackFailed {
                source_key,
                target_product,
            } => {
                tracing::error!(
                    "exchange rollback failed for {} while crediting {}; manual reconciliation required",
                    source_key,
                    target_product
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Exchange rollback failed",
                    Some(format!("source license {source_key} needs manual review")),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
