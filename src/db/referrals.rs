//! Append-only referral bonus ledger.

use rusqlite::params;

use crate::db::DbPool;
use crate::error::Result;
use crate::models::{Referral, ReferralStats};
use crate::util::now;

#[derive(Clone)]
pub struct ReferralLedger {
    pool: DbPool,
}

impl ReferralLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a referral bonus. Uses INSERT OR IGNORE against the
    /// (referrer, referred, product) uniqueness, so a repeat attempt returns
    /// None instead of awarding twice.
    pub fn record(
        &self,
        referrer_id: &str,
        referred_id: &str,
        product: &str,
        days_awarded: i64,
    ) -> Result<Option<Referral>> {
        let conn = self.pool.get()?;
        let created_at = now();
        let affected = conn.execute(
            "INSERT OR IGNORE INTO referrals (referrer_id, referred_id, product, days_awarded, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![referrer_id, referred_id, product, days_awarded, created_at],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        Ok(Some(Referral {
            id: conn.last_insert_rowid(),
            referrer_id: referrer_id.to_string(),
            referred_id: referred_id.to_string(),
            product: product.to_string(),
            days_awarded,
            created_at,
        }))
    }

    /// How many referrals an owner has made and the total days earned.
    pub fn stats(&self, referrer_id: &str) -> Result<ReferralStats> {
        let conn = self.pool.get()?;
        let stats = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(days_awarded), 0)
             FROM referrals WHERE referrer_id = ?1",
            params![referrer_id],
            |row| {
                Ok(ReferralStats {
                    count: row.get(0)?,
                    days_awarded: row.get(1)?,
                })
            },
        )?;
        Ok(stats)
    }
}
