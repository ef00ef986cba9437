mod licenses;
mod maintenance;
mod owners;

pub use licenses::*;
pub use maintenance::*;
pub use owners::*;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::db::AppState;
use crate::middleware::service_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/licenses", post(issue_license))
        .route("/admin/licenses", get(list_licenses))
        .route("/admin/licenses/{key}", get(get_license))
        .route("/admin/licenses/{key}", delete(delete_license))
        .route("/admin/licenses/{key}/extend", post(extend_license))
        .route("/admin/licenses/{key}/revoke", post(revoke_license))
        .route("/admin/licenses/{key}/hwid/reset", post(reset_license_hwid))
        .route("/admin/owners/{owner_id}/revoke", post(revoke_owner))
        .route("/admin/owners/{owner_id}", delete(delete_owner))
        .route("/admin/owners/{owner_id}/hwid/reset", post(reset_owner_hwid))
        .route("/admin/hwid/reset-all", post(reset_all_hwids))
        .route("/admin/duplicates/cleanup", post(cleanup_duplicates))
        .route("/admin/stats", get(license_stats))
        .layer(middleware::from_fn_with_state(state, service_auth))
}
