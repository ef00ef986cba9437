//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const LICENSE_COLS: &str = "license_key, owner_id, owner_name, product, created_at, expires_at, revoked, hwid, pending_days, expiry_notified, warning_notified";

pub const PENDING_ORDER_COLS: &str =
    "id, email, product, days, order_number, customer_name, created_at, claimed, claimed_by, claimed_at";

pub const NOTIFICATION_COLS: &str = "id, owner_id, license_key, product, expires_at, customer_name, email, order_number, created_at, delivered, delivery_attempts, last_attempt_at, error_message";

// ============ FromRow Implementations ============

impl FromRow for License {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(License {
            license_key: row.get(0)?,
            owner_id: row.get(1)?,
            owner_name: row.get(2)?,
            product: row.get(3)?,
            created_at: row.get(4)?,
            expires_at: row.get(5)?,
            revoked: row.get(6)?,
            hwid: row.get(7)?,
            pending_days: row.get(8)?,
            expiry_notified: row.get(9)?,
            warning_notified: row.get(10)?,
        })
    }
}

impl FromRow for PendingOrder {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PendingOrder {
            id: row.get(0)?,
            email: row.get(1)?,
            product: row.get(2)?,
            days: row.get(3)?,
            order_number: row.get(4)?,
            customer_name: row.get(5)?,
            created_at: row.get(6)?,
            claimed: row.get(7)?,
            claimed_by: row.get(8)?,
            claimed_at: row.get(9)?,
        })
    }
}

impl FromRow for NotificationRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(NotificationRecord {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            license_key: row.get(2)?,
            product: row.get(3)?,
            expires_at: row.get(4)?,
            customer_name: row.get(5)?,
            email: row.get(6)?,
            order_number: row.get(7)?,
            created_at: row.get(8)?,
            delivered: row.get(9)?,
            delivery_attempts: row.get(10)?,
            last_attempt_at: row.get(11)?,
            error_message: row.get(12)?,
        })
    }
}

