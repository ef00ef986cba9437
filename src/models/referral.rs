use serde::{Deserialize, Serialize};

/// Append-only record of a referral bonus. One bonus per
/// (referrer, referred, product) triple, enforced by the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub id: i64,
    pub referrer_id: String,
    pub referred_id: String,
    pub product: String,
    pub days_awarded: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReferralStats {
    pub count: i64,
    pub days_awarded: i64,
}
