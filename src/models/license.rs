use serde::{Deserialize, Serialize};

/// Expiry stored for licenses whose countdown has not started yet
/// (2100-01-01T00:00:00Z). Cleared by `activate_pending`.
pub const PENDING_EXPIRY_SENTINEL: i64 = 4_102_444_800;

/// Product assumed when a caller names none.
pub const DEFAULT_PRODUCT: &str = "forge";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    /// The signed token string itself; globally unique.
    pub license_key: String,
    /// External identity (numeric string, e.g. a chat-platform account id).
    pub owner_id: String,
    pub owner_name: String,
    pub product: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub revoked: bool,
    /// Device fingerprint; set exactly once on first verified use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hwid: Option<String>,
    /// When set, the countdown starts on first activation instead of at
    /// creation and `expires_at` holds the far-future sentinel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_days: Option<i64>,
    pub expiry_notified: bool,
    pub warning_notified: bool,
}

impl License {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    pub fn is_active(&self, now: i64) -> bool {
        !self.revoked && self.expires_at > now
    }

    pub fn is_pending(&self) -> bool {
        self.pending_days.is_some()
    }

    /// Seconds left on the clock, floored at zero.
    pub fn remaining_seconds(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }
}

#[derive(Debug, Clone)]
pub struct CreateLicense {
    pub license_key: String,
    pub owner_id: String,
    pub owner_name: String,
    pub product: String,
    /// Ignored when `pending_days` is set; the store writes the sentinel.
    pub expires_at: i64,
    pub pending_days: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LicenseStats {
    pub total: i64,
    pub active: i64,
    pub expired: i64,
    pub revoked: i64,
}

/// Outcome of a duplicate sweep: for every (owner, product) group that held
/// more than one live license, which key survived and which were dropped.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCleanup {
    pub groups: Vec<DuplicateGroup>,
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub owner_id: String,
    pub product: String,
    pub kept_key: String,
    pub removed_keys: Vec<String>,
}
