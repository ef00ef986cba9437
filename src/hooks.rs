//! Entitlement lifecycle hooks.
//!
//! The expiry sweeps and the exchange engine announce lifecycle events
//! through this seam. Delivery is best-effort: a hook failure is logged and
//! reported to the caller, never propagated as an error, and never blocks
//! the state change that triggered it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::models::License;

const HOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait EntitlementHook: Send + Sync {
    /// A license crossed its expiry. Fired once per license.
    async fn entitlement_expired(&self, license: &License) -> bool;

    /// A license will expire within the warning window.
    async fn entitlement_expiring(&self, license: &License, expires_in_secs: i64) -> bool;

    /// Time was credited to a license (exchange target).
    async fn entitlement_granted(&self, license: &License) -> bool;

    /// A license was drained to zero (exchange source).
    async fn entitlement_revoked(&self, license: &License) -> bool;
}

/// Posts events to a configured webhook URL as JSON.
pub struct WebhookHook {
    client: Client,
    url: String,
}

impl WebhookHook {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    async fn post(&self, event: &str, payload: serde_json::Value) -> bool {
        let result = self
            .client
            .post(&self.url)
            .timeout(HOOK_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .and_then(|resp| resp.error_for_status());
        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("entitlement hook '{}' delivery failed: {}", event, e);
                false
            }
        }
    }

    fn base_payload(event: &str, license: &License) -> serde_json::Value {
        json!({
            "event": event,
            "license_key": license.license_key,
            "owner_id": license.owner_id,
            "product": license.product,
            "expires_at": license.expires_at,
        })
    }
}

#[async_trait]
impl EntitlementHook for WebhookHook {
    async fn entitlement_expired(&self, license: &License) -> bool {
        self.post("expired", Self::base_payload("expired", license))
            .await
    }

    async fn entitlement_expiring(&self, license: &License, expires_in_secs: i64) -> bool {
        let mut payload = Self::base_payload("expiring", license);
        payload["expires_in_seconds"] = json!(expires_in_secs);
        self.post("expiring", payload).await
    }

    async fn entitlement_granted(&self, license: &License) -> bool {
        self.post("granted", Self::base_payload("granted", license))
            .await
    }

    async fn entitlement_revoked(&self, license: &License) -> bool {
        self.post("revoked", Self::base_payload("revoked", license))
            .await
    }
}

/// Log-only hook used when no webhook URL is configured.
pub struct NullHook;

#[async_trait]
impl EntitlementHook for NullHook {
    async fn entitlement_expired(&self, license: &License) -> bool {
        tracing::debug!("license {} expired ({})", license.license_key, license.owner_id);
        true
    }

    async fn entitlement_expiring(&self, license: &License, expires_in_secs: i64) -> bool {
        tracing::debug!(
            "license {} expires in {}s ({})",
            license.license_key,
            expires_in_secs,
            license.owner_id
        );
        true
    }

    async fn entitlement_granted(&self, license: &License) -> bool {
        tracing::debug!("license {} granted time ({})", license.license_key, license.owner_id);
        true
    }

    async fn entitlement_revoked(&self, license: &License) -> bool {
        tracing::debug!("license {} drained ({})", license.license_key, license.owner_id);
        true
    }
}
