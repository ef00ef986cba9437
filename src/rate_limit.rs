//! Rate limiting for the public surface.
//!
//! Applied per client IP. Only `/verify` and `/token` need protection: they
//! are unauthenticated and do crypto plus a database read per request. The
//! service and admin surfaces sit behind bearer auth and trusted callers, so
//! they are left unlimited.
//!
//! Configure via `RATE_LIMIT_PER_SECOND` and `RATE_LIMIT_BURST`.

use std::sync::Arc;
use std::time::Duration;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Steady-state refill of `per_second` requests with a bucket of `burst`,
/// so short client retries pass but sustained scraping does not.
pub fn public_layer(per_second: u64, burst: u32) -> RateLimitLayer {
    assert!(per_second > 0, "rate limit must be greater than 0");
    assert!(burst > 0, "burst size must be greater than 0");

    let period = Duration::from_millis((1000 / per_second).max(1));
    let config = GovernorConfigBuilder::default()
        .period(period)
        .burst_size(burst)
        .finish()
        .expect("rate limiter config is valid");

    GovernorLayer::new(Arc::new(config))
}
