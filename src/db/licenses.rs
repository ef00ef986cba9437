//! License lifecycle store.
//!
//! Owns the `licenses` table. Every mutation is a single guarded SQL
//! statement (or one short transaction for the duplicate sweep), so
//! concurrent callers race on the database, not in process memory.

use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::db::from_row::{query_all, query_one, LICENSE_COLS};
use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::models::{
    CreateLicense, DuplicateCleanup, DuplicateGroup, License, LicenseStats,
    PENDING_EXPIRY_SENTINEL,
};
use crate::token::TokenCodec;
use crate::util::now;

/// Asymmetric expiry shift, applied in one statement:
/// adding time starts from `max(expires_at, now)` so expired licenses
/// resume from today, while removing time subtracts from the stored expiry
/// directly. Either direction clears `revoked`.
const SHIFT_EXPIRY_SQL: &str = "UPDATE licenses
     SET expires_at = CASE
             WHEN ?2 >= 0 THEN MAX(expires_at, ?1) + ?2
             ELSE expires_at + ?2
         END,
         revoked = 0
     WHERE license_key = ?3
     RETURNING expires_at";

#[derive(Clone)]
pub struct LicenseStore {
    pool: DbPool,
}

impl LicenseStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    // ============ Creation ============

    /// Insert a new license. The key must be globally unique; a collision is
    /// an error, never a merge. With `pending_days` set, the stored expiry is
    /// the far-future sentinel until first activation.
    pub fn create(&self, input: &CreateLicense) -> Result<License> {
        let conn = self.pool.get()?;
        let created_at = now();
        let expires_at = if input.pending_days.is_some() {
            PENDING_EXPIRY_SENTINEL
        } else {
            input.expires_at
        };

        conn.execute(
            "INSERT INTO licenses (license_key, owner_id, owner_name, product, created_at, expires_at, pending_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                input.license_key,
                input.owner_id,
                input.owner_name,
                input.product,
                created_at,
                expires_at,
                input.pending_days,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateKey(input.license_key.clone())
            } else {
                e.into()
            }
        })?;

        Ok(License {
            license_key: input.license_key.clone(),
            owner_id: input.owner_id.clone(),
            owner_name: input.owner_name.clone(),
            product: input.product.clone(),
            created_at,
            expires_at,
            revoked: false,
            hwid: None,
            pending_days: input.pending_days,
            expiry_notified: false,
            warning_notified: false,
        })
    }

    /// Mint a token via the codec and insert it as a new license. A key
    /// collision gets a freshly-nonced token, up to three attempts.
    pub fn issue(
        &self,
        codec: &TokenCodec,
        owner_id: &str,
        owner_name: &str,
        product: &str,
        expires_at: i64,
        pending_days: Option<i64>,
    ) -> Result<License> {
        let token_expiry = if pending_days.is_some() {
            PENDING_EXPIRY_SENTINEL
        } else {
            expires_at
        };
        let mut attempt = 0;
        loop {
            let license_key = codec.issue_with_expiry(owner_id, owner_name, token_expiry, None);
            match self.create(&CreateLicense {
                license_key,
                owner_id: owner_id.to_string(),
                owner_name: owner_name.to_string(),
                product: product.to_string(),
                expires_at,
                pending_days,
            }) {
                Err(AppError::DuplicateKey(_)) if attempt < 2 => attempt += 1,
                other => return other,
            }
        }
    }

    // ============ Expiry Shifts ============

    /// Shift a license's expiry by `delta_seconds` (positive or negative)
    /// under the asymmetric base rule. Returns the new expiry, or None when
    /// the key does not exist.
    pub fn extend(&self, key: &str, delta_seconds: i64) -> Result<Option<i64>> {
        let conn = self.pool.get()?;
        conn.query_row(SHIFT_EXPIRY_SQL, params![now(), delta_seconds, key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(Into::into)
    }

    /// Apply the same shift to the owner's latest non-revoked license.
    /// Returns the affected key and its new expiry.
    pub fn extend_for_owner(
        &self,
        owner_id: &str,
        delta_seconds: i64,
        product: Option<&str>,
    ) -> Result<Option<(String, i64)>> {
        let conn = self.pool.get()?;
        conn.query_row(
            "UPDATE licenses
             SET expires_at = CASE
                     WHEN ?2 >= 0 THEN MAX(expires_at, ?1) + ?2
                     ELSE expires_at + ?2
                 END,
                 revoked = 0
             WHERE license_key = (
                 SELECT license_key FROM licenses
                 WHERE owner_id = ?3 AND revoked = 0 AND (?4 IS NULL OR product = ?4)
                 ORDER BY expires_at DESC, created_at DESC, license_key DESC
                 LIMIT 1
             )
             RETURNING license_key, expires_at",
            params![now(), delta_seconds, owner_id, product],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(Into::into)
    }

    // ============ Revocation & Deletion ============

    /// Mark revoked. Expiry is untouched, so un-revoking by extend restores
    /// whatever time was left.
    pub fn revoke(&self, key: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let affected = conn.execute(
            "UPDATE licenses SET revoked = 1 WHERE license_key = ?1",
            params![key],
        )?;
        Ok(affected > 0)
    }

    pub fn revoke_all_for_owner(&self, owner_id: &str) -> Result<usize> {
        let conn = self.pool.get()?;
        Ok(conn.execute(
            "UPDATE licenses SET revoked = 1 WHERE owner_id = ?1 AND revoked = 0",
            params![owner_id],
        )?)
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let affected = conn.execute(
            "DELETE FROM licenses WHERE license_key = ?1",
            params![key],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_all_for_owner(&self, owner_id: &str) -> Result<usize> {
        let conn = self.pool.get()?;
        Ok(conn.execute(
            "DELETE FROM licenses WHERE owner_id = ?1",
            params![owner_id],
        )?)
    }

    // ============ Lookups ============

    pub fn get(&self, key: &str) -> Result<Option<License>> {
        let conn = self.pool.get()?;
        query_one(
            &conn,
            &format!("SELECT {} FROM licenses WHERE license_key = ?1", LICENSE_COLS),
            &[&key],
        )
    }

    /// The owner's best non-revoked license (latest expiry wins). May be
    /// expired; callers that need a live one check the expiry themselves.
    pub fn get_active_for_owner(
        &self,
        owner_id: &str,
        product: Option<&str>,
    ) -> Result<Option<License>> {
        let conn = self.pool.get()?;
        query_one(
            &conn,
            &format!(
                "SELECT {} FROM licenses
                 WHERE owner_id = ?1 AND revoked = 0 AND (?2 IS NULL OR product = ?2)
                 ORDER BY expires_at DESC, created_at DESC, license_key DESC
                 LIMIT 1",
                LICENSE_COLS
            ),
            &[&owner_id, &product],
        )
    }

    /// Latest license including revoked ones, so boundaries can distinguish
    /// "revoked" from "expired" from "never had one".
    pub fn get_latest_for_owner(
        &self,
        owner_id: &str,
        product: Option<&str>,
    ) -> Result<Option<License>> {
        let conn = self.pool.get()?;
        query_one(
            &conn,
            &format!(
                "SELECT {} FROM licenses
                 WHERE owner_id = ?1 AND (?2 IS NULL OR product = ?2)
                 ORDER BY revoked ASC, expires_at DESC, created_at DESC, license_key DESC
                 LIMIT 1",
                LICENSE_COLS
            ),
            &[&owner_id, &product],
        )
    }

    pub fn list_for_owner(&self, owner_id: &str) -> Result<Vec<License>> {
        let conn = self.pool.get()?;
        query_all(
            &conn,
            &format!(
                "SELECT {} FROM licenses WHERE owner_id = ?1 ORDER BY created_at DESC",
                LICENSE_COLS
            ),
            &[&owner_id],
        )
    }

    /// Licenses that are live right now (not revoked, not expired).
    pub fn list_active(&self, product: Option<&str>) -> Result<Vec<License>> {
        let conn = self.pool.get()?;
        query_all(
            &conn,
            &format!(
                "SELECT {} FROM licenses
                 WHERE revoked = 0 AND expires_at > ?1 AND (?2 IS NULL OR product = ?2)
                 ORDER BY expires_at DESC",
                LICENSE_COLS
            ),
            &[&now(), &product],
        )
    }

    pub fn has_active(&self, owner_id: &str, product: Option<&str>) -> Result<bool> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM licenses
             WHERE owner_id = ?1 AND revoked = 0 AND expires_at > ?2
               AND (?3 IS NULL OR product = ?3)",
            params![owner_id, now(), product],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Exact partition: every row is counted as active, expired, or revoked.
    pub fn stats(&self, product: Option<&str>) -> Result<LicenseStats> {
        let conn = self.pool.get()?;
        let ts = now();
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN revoked = 0 AND expires_at > ?1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN revoked = 0 AND expires_at <= ?1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN revoked = 1 THEN 1 ELSE 0 END), 0)
             FROM licenses WHERE (?2 IS NULL OR product = ?2)",
            params![ts, product],
            |row| {
                Ok(LicenseStats {
                    total: row.get(0)?,
                    active: row.get(1)?,
                    expired: row.get(2)?,
                    revoked: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }

    // ============ Duplicate Cleanup ============

    /// For every (owner, product) group holding more than one non-revoked
    /// license, keep the one with the latest expiry (created_at, then key,
    /// break ties) and hard-delete the rest. One transaction; maintenance
    /// only, never on a request path.
    pub fn reset_duplicates(&self) -> Result<DuplicateCleanup> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let groups: Vec<(String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT owner_id, product FROM licenses
                 WHERE revoked = 0
                 GROUP BY owner_id, product
                 HAVING COUNT(*) > 1
                 ORDER BY owner_id, product",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut report = DuplicateCleanup {
            groups: Vec::with_capacity(groups.len()),
            removed: 0,
        };

        for (owner_id, product) in groups {
            let keys: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT license_key FROM licenses
                     WHERE owner_id = ?1 AND product = ?2 AND revoked = 0
                     ORDER BY expires_at DESC, created_at DESC, license_key DESC",
                )?;
                let rows = stmt
                    .query_map(params![owner_id, product], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            };

            let (kept, losers) = match keys.split_first() {
                Some(split) => split,
                None => continue,
            };
            for key in losers {
                tx.execute("DELETE FROM licenses WHERE license_key = ?1", params![key])?;
            }

            report.removed += losers.len();
            report.groups.push(DuplicateGroup {
                owner_id,
                product,
                kept_key: kept.clone(),
                removed_keys: losers.to_vec(),
            });
        }

        tx.commit()?;
        if report.removed > 0 {
            tracing::info!(
                "duplicate cleanup removed {} licenses across {} groups",
                report.removed,
                report.groups.len()
            );
        }
        Ok(report)
    }

    // ============ Device Binding ============

    /// Bind a fingerprint iff none is set. The `hwid IS NULL` guard makes
    /// first-bind-wins hold under concurrency.
    pub fn bind_hwid(&self, key: &str, hwid: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let affected = conn.execute(
            "UPDATE licenses SET hwid = ?2 WHERE license_key = ?1 AND hwid IS NULL",
            params![key, hwid],
        )?;
        Ok(affected > 0)
    }

    /// Clear the fingerprint. Idempotent: true means the key exists.
    pub fn reset_hwid(&self, key: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let affected = conn.execute(
            "UPDATE licenses SET hwid = NULL WHERE license_key = ?1",
            params![key],
        )?;
        Ok(affected > 0)
    }

    /// Clear fingerprints across an owner. Counts only rows that had one.
    pub fn reset_hwid_for_owner(&self, owner_id: &str) -> Result<usize> {
        let conn = self.pool.get()?;
        Ok(conn.execute(
            "UPDATE licenses SET hwid = NULL WHERE owner_id = ?1 AND hwid IS NOT NULL",
            params![owner_id],
        )?)
    }

    /// Clear every fingerprint, optionally scoped to one product.
    pub fn reset_all_hwids(&self, product: Option<&str>) -> Result<usize> {
        let conn = self.pool.get()?;
        Ok(conn.execute(
            "UPDATE licenses SET hwid = NULL
             WHERE hwid IS NOT NULL AND (?1 IS NULL OR product = ?1)",
            params![product],
        )?)
    }

    // ============ Pending Activation ============

    /// Start the countdown of a not-yet-activated license: the real expiry
    /// becomes now + pending_days. Returns the new expiry, or None when the
    /// license does not exist or was already activated.
    pub fn activate_pending(&self, key: &str) -> Result<Option<i64>> {
        let conn = self.pool.get()?;
        conn.query_row(
            "UPDATE licenses
             SET expires_at = ?1 + pending_days * 86400, pending_days = NULL
             WHERE license_key = ?2 AND pending_days IS NOT NULL
             RETURNING expires_at",
            params![now(), key],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    // ============ Sweep Support ============

    /// Rows that crossed their expiry and were never announced. The
    /// `expiry_notified` flag makes each row show up exactly once.
    pub fn newly_expired(&self) -> Result<Vec<License>> {
        let conn = self.pool.get()?;
        query_all(
            &conn,
            &format!(
                "SELECT {} FROM licenses
                 WHERE expires_at <= ?1 AND revoked = 0 AND expiry_notified = 0
                 ORDER BY expires_at ASC",
                LICENSE_COLS
            ),
            &[&now()],
        )
    }

    pub fn mark_expiry_notified(&self, key: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE licenses SET expiry_notified = 1 WHERE license_key = ?1",
            params![key],
        )?;
        Ok(())
    }

    /// Live rows expiring within the window (now, now + window]. Pending
    /// licenses sit at the sentinel and never fall inside it.
    pub fn expiring_within(&self, window_seconds: i64) -> Result<Vec<License>> {
        let conn = self.pool.get()?;
        let ts = now();
        query_all(
            &conn,
            &format!(
                "SELECT {} FROM licenses
                 WHERE expires_at > ?1 AND expires_at <= ?1 + ?2
                   AND revoked = 0 AND warning_notified = 0
                 ORDER BY expires_at ASC",
                LICENSE_COLS
            ),
            &[&ts, &window_seconds],
        )
    }

    pub fn mark_warning_notified(&self, key: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE licenses SET warning_notified = 1 WHERE license_key = ?1",
            params![key],
        )?;
        Ok(())
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
