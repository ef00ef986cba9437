//! Expiry and warning sweeps.
//!
//! Two periodic passes over the licenses table: one announces licenses that
//! crossed their expiry, one warns about licenses that are about to. Each
//! row is announced exactly once per transition; the `*_notified` flags only
//! move forward, and a failed hook delivery still flags the row so the sweep
//! self-terminates instead of retrying forever.

use std::sync::Arc;
use std::time::Duration;

use crate::db::licenses::LicenseStore;
use crate::error::Result;
use crate::hooks::EntitlementHook;
use crate::util::{now, SECONDS_PER_DAY};

#[derive(Clone)]
pub struct ExpiryWatcher {
    store: LicenseStore,
    hooks: Arc<dyn EntitlementHook>,
    expiry_interval: Duration,
    warning_interval: Duration,
    warning_window_secs: i64,
}

/// What a single sweep pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Rows flagged as notified this pass.
    pub swept: usize,
    /// Hook deliveries that succeeded.
    pub announced: usize,
}

impl ExpiryWatcher {
    pub fn new(
        store: LicenseStore,
        hooks: Arc<dyn EntitlementHook>,
        expiry_sweep_secs: u64,
        warning_sweep_secs: u64,
        warning_window_days: i64,
    ) -> Self {
        Self {
            store,
            hooks,
            expiry_interval: Duration::from_secs(expiry_sweep_secs),
            warning_interval: Duration::from_secs(warning_sweep_secs),
            warning_window_secs: warning_window_days * SECONDS_PER_DAY,
        }
    }

    /// One expiry pass: announce every license that crossed its expiry since
    /// the last pass, then flag it regardless of delivery outcome.
    pub async fn run_expiry_sweep(&self) -> Result<SweepOutcome> {
        let rows = self.store.newly_expired()?;
        let mut outcome = SweepOutcome::default();
        for license in rows {
            if self.hooks.entitlement_expired(&license).await {
                outcome.announced += 1;
            }
            self.store.mark_expiry_notified(&license.license_key)?;
            outcome.swept += 1;
        }
        Ok(outcome)
    }

    /// One warning pass over licenses expiring within the window.
    pub async fn run_warning_sweep(&self) -> Result<SweepOutcome> {
        let rows = self.store.expiring_within(self.warning_window_secs)?;
        let mut outcome = SweepOutcome::default();
        let ts = now();
        for license in rows {
            if self
                .hooks
                .entitlement_expiring(&license, license.remaining_seconds(ts))
                .await
            {
                outcome.announced += 1;
            }
            self.store.mark_warning_notified(&license.license_key)?;
            outcome.swept += 1;
        }
        Ok(outcome)
    }

    /// Spawn both sweep loops. Failures are logged and the loops keep going.
    pub fn spawn(self) {
        let expiry_interval = self.expiry_interval;
        let warning_interval = self.warning_interval;

        let watcher = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(watcher.expiry_interval).await;
                match watcher.run_expiry_sweep().await {
                    Ok(outcome) if outcome.swept > 0 => {
                        tracing::info!(
                            "expiry sweep flagged {} licenses ({} announced)",
                            outcome.swept,
                            outcome.announced
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("expiry sweep failed: {}", e),
                }
            }
        });

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.warning_interval).await;
                match self.run_warning_sweep().await {
                    Ok(outcome) if outcome.swept > 0 => {
                        tracing::info!(
                            "warning sweep flagged {} licenses ({} announced)",
                            outcome.swept,
                            outcome.announced
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("warning sweep failed: {}", e),
                }
            }
        });

        tracing::info!(
            "expiry watcher started (expiry every {:?}, warnings every {:?})",
            expiry_interval,
            warning_interval
        );
    }
}
