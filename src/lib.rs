//! Keywarden - licensing and entitlement engine
//!
//! This library provides the core functionality for the keywarden service:
//! self-contained signed license tokens, the license lifecycle store, device
//! binding, expiry sweeps, cross-product time exchange, and durable
//! notification delivery, plus the HTTP boundaries that expose them.

pub mod binding;
pub mod config;
pub mod db;
pub mod error;
pub mod exchange;
pub mod expiry;
pub mod extractors;
pub mod handlers;
pub mod hooks;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod rate_limit;
pub mod token;
pub mod util;
