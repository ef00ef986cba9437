use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::exchange::ExchangeReceipt;
use crate::extractors::Json;

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    pub owner_id: String,
    pub source_product: String,
    pub target_product: String,
    /// Fractional days are allowed; the engine works in whole seconds.
    pub days: f64,
}

/// POST /exchange - move remaining time between the owner's products.
pub async fn exchange_time(
    State(state): State<AppState>,
    Json(req): Json<ExchangeRequest>,
) -> Result<Json<ExchangeReceipt>> {
    let receipt = state
        .exchange
        .execute(
            &req.owner_id,
            &req.source_product,
            &req.target_product,
            req.days,
        )
        .await?;
    Ok(Json(receipt))
}
