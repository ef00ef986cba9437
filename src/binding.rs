//! First-use device binding.
//!
//! A license may be pinned to a single device fingerprint. The first
//! fingerprint ever presented wins, atomically; afterwards only that device
//! passes. A mismatch never mutates anything, and a missing fingerprint
//! skips enforcement entirely.

use crate::db::licenses::LicenseStore;
use crate::error::Result;
use crate::models::License;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingCheck {
    /// No fingerprint presented; nothing enforced.
    Skipped,
    /// First fingerprint accepted and stored.
    Bound,
    /// Fingerprint matches the stored one.
    Matched,
    /// Fingerprint differs from the stored one.
    Mismatch,
}

#[derive(Clone)]
pub struct DeviceBindingGuard {
    store: LicenseStore,
}

impl DeviceBindingGuard {
    pub fn new(store: LicenseStore) -> Self {
        Self { store }
    }

    /// Enforce the one-device rule against a freshly loaded license row.
    pub fn enforce(&self, license: &License, hwid: Option<&str>) -> Result<BindingCheck> {
        let Some(hwid) = hwid.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(BindingCheck::Skipped);
        };

        match license.hwid.as_deref() {
            Some(stored) if stored == hwid => Ok(BindingCheck::Matched),
            Some(_) => Ok(BindingCheck::Mismatch),
            None => {
                if self.store.bind_hwid(&license.license_key, hwid)? {
                    return Ok(BindingCheck::Bound);
                }
                // Lost the first-bind race: someone else's fingerprint landed
                // between our read and the guarded update. Re-read and compare.
                match self.store.get(&license.license_key)? {
                    Some(current) if current.hwid.as_deref() == Some(hwid) => {
                        Ok(BindingCheck::Matched)
                    }
                    _ => Ok(BindingCheck::Mismatch),
                }
            }
        }
    }

    pub fn reset_by_key(&self, key: &str) -> Result<bool> {
        self.store.reset_hwid(key)
    }

    pub fn reset_by_owner(&self, owner_id: &str) -> Result<usize> {
        self.store.reset_hwid_for_owner(owner_id)
    }

    pub fn reset_all(&self, product: Option<&str>) -> Result<usize> {
        self.store.reset_all_hwids(product)
    }
}
