mod exchange;
mod notifications;
mod purchases;
mod redeem;
mod referrals;

pub use exchange::*;
pub use notifications::*;
pub use purchases::*;
pub use redeem::*;
pub use referrals::*;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::db::AppState;
use crate::middleware::service_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/redeem", post(redeem_purchase))
        .route("/purchases", post(record_purchase))
        .route("/exchange", post(exchange_time))
        .route("/notifications/pending", get(pending_notifications))
        .route("/notifications/failed", get(failed_notifications))
        .route("/notifications/{id}/delivered", post(notification_delivered))
        .route("/notifications/{id}/failed", post(notification_failed))
        .route("/referrals", post(record_referral))
        .route("/referrals/{owner_id}", get(referral_stats))
        .layer(middleware::from_fn_with_state(state, service_auth))
}
