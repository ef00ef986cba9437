//! Durable at-least-once delivery queue for "license ready" events.
//!
//! Records are rows, never process memory: enqueue commits before the
//! purchase response goes out, and a crashed poller simply re-reads the
//! pending set. After `MAX_DELIVERY_ATTEMPTS` failures a record leaves the
//! pending set but stays in the table for operators.

use rusqlite::{params, OptionalExtension};

use crate::db::from_row::{query_all, FromRow, NOTIFICATION_COLS};
use crate::db::DbPool;
use crate::error::Result;
use crate::models::{CreateNotification, NotificationRecord, MAX_DELIVERY_ATTEMPTS};
use crate::util::now;

#[derive(Clone)]
pub struct NotificationQueue {
    pool: DbPool,
}

impl NotificationQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a record synchronously; delivery happens later. Returns the id.
    pub fn enqueue(&self, input: &CreateNotification) -> Result<i64> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO notifications (owner_id, license_key, product, expires_at, customer_name, email, order_number, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                input.owner_id,
                input.license_key,
                input.product,
                input.expires_at,
                input.customer_name,
                input.email,
                input.order_number,
                now(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Undelivered records that still have attempts left, oldest first.
    pub fn poll_pending(&self, limit: i64) -> Result<Vec<NotificationRecord>> {
        let conn = self.pool.get()?;
        query_all(
            &conn,
            &format!(
                "SELECT {} FROM notifications
                 WHERE delivered = 0 AND delivery_attempts < {}
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?1",
                NOTIFICATION_COLS, MAX_DELIVERY_ATTEMPTS
            ),
            &[&limit],
        )
    }

    /// Terminal success. Idempotent: duplicate deliveries are expected under
    /// at-least-once, so re-marking is not an error. False means no such id.
    pub fn mark_delivered(&self, id: i64) -> Result<bool> {
        let conn = self.pool.get()?;
        let affected = conn.execute(
            "UPDATE notifications SET delivered = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(affected > 0)
    }

    /// Count one failed attempt and record why. False means no such
    /// undelivered record.
    pub fn mark_failed(&self, id: i64, reason: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let affected = conn.execute(
            "UPDATE notifications
             SET delivery_attempts = delivery_attempts + 1,
                 last_attempt_at = ?2,
                 error_message = ?3
             WHERE id = ?1 AND delivered = 0",
            params![id, now(), reason],
        )?;
        Ok(affected > 0)
    }

    /// Records that exhausted their attempts, newest first. Never
    /// auto-deleted; this is the operator's reconciliation view.
    pub fn failed(&self) -> Result<Vec<NotificationRecord>> {
        let conn = self.pool.get()?;
        query_all(
            &conn,
            &format!(
                "SELECT {} FROM notifications
                 WHERE delivered = 0 AND delivery_attempts >= {}
                 ORDER BY created_at DESC, id DESC",
                NOTIFICATION_COLS, MAX_DELIVERY_ATTEMPTS
            ),
            &[],
        )
    }

    pub fn get(&self, id: i64) -> Result<Option<NotificationRecord>> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLS),
            params![id],
            NotificationRecord::from_row,
        )
        .optional()
        .map_err(Into::into)
    }
}
