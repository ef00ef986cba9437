//! Bearer auth for the service and admin surfaces.
//!
//! One shared credential covers both: the callers are the trusted bot
//! process and operator tooling, not end users, so there is no role tier.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::db::AppState;
use crate::error::AppError;
use crate::util::extract_bearer_token;

type HmacSha256 = Hmac<Sha256>;

/// Compare credentials without leaking a prefix match through timing. Both
/// sides are tagged under a throwaway key and the tags are compared in
/// constant time via `Mac::verify_slice`.
fn credentials_match(expected: &str, presented: &str) -> bool {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);

    let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC can take key of any size");
    mac.update(expected.as_bytes());
    let expected_tag = mac.finalize().into_bytes();

    let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC can take key of any size");
    mac.update(presented.as_bytes());
    mac.verify_slice(&expected_tag).is_ok()
}

/// Rejects any request whose bearer token is not the configured service
/// token. Applied with `middleware::from_fn_with_state` on the service and
/// admin routers.
pub async fn service_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;
    if !credentials_match(&state.service_token, token) {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(request).await)
}
