//! Cross-product time exchange.
//!
//! Moves remaining subscription time between products at a fixed rate. The
//! debit and credit are separate row mutations, not one transaction: a
//! failed credit is compensated by re-crediting the source, and a failed
//! compensation is surfaced as its own error naming the license that needs
//! manual reconciliation.

use std::sync::Arc;

use serde::Serialize;

use crate::db::licenses::LicenseStore;
use crate::error::{AppError, Result};
use crate::hooks::EntitlementHook;
use crate::models::{CreateLicense, License};
use crate::token::TokenCodec;
use crate::util::{days_to_seconds, now, seconds_to_days};

/// Fixed conversion rates between products. One day of `forge` buys two
/// days of `loom`, and the reverse pair is its exact reciprocal.
pub const EXCHANGE_RATES: &[(&str, &str, f64)] = &[
    ("forge", "loom", 2.0),
    ("loom", "forge", 0.5),
];

pub fn exchange_rate(source: &str, target: &str) -> Option<f64> {
    EXCHANGE_RATES
        .iter()
        .find(|(s, t, _)| *s == source && *t == target)
        .map(|(_, _, rate)| *rate)
}

/// Whole seconds credited for a debit of `requested_seconds` at `rate`.
/// Rounding policy: floor, so conversion never mints more time than the
/// rate allows. The debit side uses the requested amount unscaled, which is
/// what lets a full-balance exchange zero the source exactly.
pub fn credited_seconds(requested_seconds: i64, rate: f64) -> i64 {
    (requested_seconds as f64 * rate).floor() as i64
}

/// The row operations the engine needs. Implemented by [`LicenseStore`];
/// tests substitute a ledger that fails on command.
pub trait ExchangeLedger: Send + Sync {
    fn active_for_owner(&self, owner_id: &str, product: &str) -> Result<Option<License>>;
    fn shift_expiry(&self, key: &str, delta_seconds: i64) -> Result<Option<i64>>;
    fn insert(&self, input: &CreateLicense) -> Result<License>;
}

impl ExchangeLedger for LicenseStore {
    fn active_for_owner(&self, owner_id: &str, product: &str) -> Result<Option<License>> {
        self.get_active_for_owner(owner_id, Some(product))
    }

    fn shift_expiry(&self, key: &str, delta_seconds: i64) -> Result<Option<i64>> {
        self.extend(key, delta_seconds)
    }

    fn insert(&self, input: &CreateLicense) -> Result<License> {
        self.create(input)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeReceipt {
    pub source_key: String,
    pub target_key: String,
    /// True when the credit minted a fresh license instead of extending one.
    pub target_created: bool,
    pub days_debited: f64,
    pub days_credited: f64,
    pub source_remaining_seconds: i64,
    pub target_expires_at: i64,
    pub source_drained: bool,
    /// Whether the best-effort lifecycle hooks all delivered. Informational;
    /// the exchange itself has already committed.
    pub hooks_applied: bool,
}

#[derive(Clone)]
pub struct ExchangeEngine<L = LicenseStore> {
    ledger: L,
    codec: TokenCodec,
    hooks: Arc<dyn EntitlementHook>,
}

impl<L: ExchangeLedger> ExchangeEngine<L> {
    pub fn new(ledger: L, codec: TokenCodec, hooks: Arc<dyn EntitlementHook>) -> Self {
        Self {
            ledger,
            codec,
            hooks,
        }
    }

    /// Move `days` (fractional allowed) of remaining time from the owner's
    /// source-product license into their target-product license, minting a
    /// fresh target license when none exists.
    pub async fn execute(
        &self,
        owner_id: &str,
        source_product: &str,
        target_product: &str,
        days: f64,
    ) -> Result<ExchangeReceipt> {
        let rate = exchange_rate(source_product, target_product).ok_or_else(|| {
            AppError::BadRequest(format!(
                "no exchange rate from {} to {}",
                source_product, target_product
            ))
        })?;
        if !days.is_finite() || days <= 0.0 {
            return Err(AppError::BadRequest("days must be positive".into()));
        }
        let requested_seconds = days_to_seconds(days);
        if requested_seconds <= 0 {
            return Err(AppError::BadRequest("exchange amount rounds to zero".into()));
        }

        let ts = now();
        let source = self
            .ledger
            .active_for_owner(owner_id, source_product)?
            .ok_or_else(|| {
                AppError::NotFound(format!("no {} subscription", source_product))
            })?;

        let available_seconds = source.remaining_seconds(ts);
        if requested_seconds > available_seconds {
            return Err(AppError::InsufficientBalance {
                requested_days: days,
                available_days: seconds_to_days(available_seconds),
            });
        }

        let target_seconds = credited_seconds(requested_seconds, rate);

        // Debit first. A negative shift subtracts from the stored expiry
        // directly, so a full-balance debit lands exactly on "now".
        let source_expiry = self
            .ledger
            .shift_expiry(&source.license_key, -requested_seconds)?
            .ok_or_else(|| {
                AppError::NotFound(format!("no {} subscription", source_product))
            })?;

        // Credit. From here on, any failure must give the debit back.
        let (target, target_created) = match self.credit_target(
            owner_id,
            &source.owner_name,
            target_product,
            target_seconds,
        ) {
            Ok(credited) => credited,
            Err(credit_err) => {
                tracing::warn!(
                    "exchange credit to {} failed for owner {}: {}; compensating debit on {}",
                    target_product,
                    owner_id,
                    credit_err,
                    source.license_key
                );
                match self.ledger.shift_expiry(&source.license_key, requested_seconds) {
                    Ok(Some(_)) => return Err(credit_err),
                    Ok(None) => {
                        return Err(AppError::RollbackFailed {
                            source_key: source.license_key.clone(),
                            target_product: target_product.to_string(),
                        })
                    }
                    Err(rollback_err) => {
                        tracing::error!(
                            "exchange compensation failed on {}: {}",
                            source.license_key,
                            rollback_err
                        );
                        return Err(AppError::RollbackFailed {
                            source_key: source.license_key.clone(),
                            target_product: target_product.to_string(),
                        });
                    }
                }
            }
        };

        let source_remaining_seconds = (source_expiry - now()).max(0);
        let source_drained = source_remaining_seconds == 0;

        let mut hooks_applied = self.hooks.entitlement_granted(&target).await;
        if source_drained {
            let mut drained = source.clone();
            drained.expires_at = source_expiry;
            hooks_applied &= self.hooks.entitlement_revoked(&drained).await;
        }

        tracing::info!(
            "exchanged {} {} days into {} {} days for owner {} ({} -> {})",
            days,
            source_product,
            seconds_to_days(target_seconds),
            target_product,
            owner_id,
            source.license_key,
            target.license_key
        );

        Ok(ExchangeReceipt {
            source_key: source.license_key,
            target_key: target.license_key.clone(),
            target_created,
            days_debited: days,
            days_credited: seconds_to_days(target_seconds),
            source_remaining_seconds,
            target_expires_at: target.expires_at,
            source_drained,
            hooks_applied,
        })
    }

    /// Extend the owner's existing target license, or mint a fresh one.
    fn credit_target(
        &self,
        owner_id: &str,
        owner_name: &str,
        target_product: &str,
        target_seconds: i64,
    ) -> Result<(License, bool)> {
        if let Some(target) = self.ledger.active_for_owner(owner_id, target_product)? {
            let new_expiry = self
                .ledger
                .shift_expiry(&target.license_key, target_seconds)?
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "license {} vanished during exchange",
                        target.license_key
                    ))
                })?;
            let mut extended = target;
            extended.expires_at = new_expiry;
            extended.revoked = false;
            return Ok((extended, false));
        }

        let expires_at = now() + target_seconds;
        let mut attempt = 0;
        loop {
            let license_key =
                self.codec
                    .issue_with_expiry(owner_id, owner_name, expires_at, None);
            match self.ledger.insert(&CreateLicense {
                license_key,
                owner_id: owner_id.to_string(),
                owner_name: owner_name.to_string(),
                product: target_product.to_string(),
                expires_at,
                pending_days: None,
            }) {
                Ok(license) => return Ok((license, true)),
                Err(AppError::DuplicateKey(_)) if attempt < 2 => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }
}
