use rusqlite::Connection;

/// Initialize the database schema.
///
/// Idempotent: safe to run on every startup. Columns that arrived after the
/// first deployment are added to pre-existing tables below.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Licenses (the key IS the signed token string)
        CREATE TABLE IF NOT EXISTS licenses (
            license_key TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            owner_name TEXT NOT NULL DEFAULT '',
            product TEXT NOT NULL DEFAULT 'forge',
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            revoked INTEGER NOT NULL DEFAULT 0,
            hwid TEXT,
            pending_days INTEGER,
            expiry_notified INTEGER NOT NULL DEFAULT 0,
            warning_notified INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_owner ON licenses(owner_id, product);
        CREATE INDEX IF NOT EXISTS idx_licenses_expiry_sweep ON licenses(expires_at) WHERE revoked = 0 AND expiry_notified = 0;
        CREATE INDEX IF NOT EXISTS idx_licenses_warning_sweep ON licenses(expires_at) WHERE revoked = 0 AND warning_notified = 0;

        -- Paid storefront orders waiting for redemption
        CREATE TABLE IF NOT EXISTS pending_orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            product TEXT NOT NULL DEFAULT 'forge',
            days INTEGER NOT NULL,
            order_number TEXT,
            customer_name TEXT,
            created_at INTEGER NOT NULL,
            claimed INTEGER NOT NULL DEFAULT 0,
            claimed_by TEXT,
            claimed_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_pending_orders_email ON pending_orders(email) WHERE claimed = 0;

        -- Durable delivery queue ("license ready" events)
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            license_key TEXT NOT NULL,
            product TEXT NOT NULL DEFAULT 'forge',
            expires_at INTEGER NOT NULL,
            customer_name TEXT,
            email TEXT,
            order_number TEXT,
            created_at INTEGER NOT NULL,
            delivered INTEGER NOT NULL DEFAULT 0,
            delivery_attempts INTEGER NOT NULL DEFAULT 0,
            last_attempt_at INTEGER,
            error_message TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_pending ON notifications(created_at) WHERE delivered = 0;

        -- Referral bonus ledger (append-only)
        CREATE TABLE IF NOT EXISTS referrals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            referrer_id TEXT NOT NULL,
            referred_id TEXT NOT NULL,
            product TEXT NOT NULL DEFAULT 'forge',
            days_awarded INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(referrer_id, referred_id, product)
        );
        CREATE INDEX IF NOT EXISTS idx_referrals_referrer ON referrals(referrer_id);
        "#,
    )?;

    // Columns added after the first deployed schema. CREATE TABLE IF NOT
    // EXISTS will not touch an existing table, so patch them in here.
    add_column_if_missing(conn, "licenses", "hwid", "hwid TEXT")?;
    add_column_if_missing(conn, "licenses", "pending_days", "pending_days INTEGER")?;
    add_column_if_missing(
        conn,
        "licenses",
        "expiry_notified",
        "expiry_notified INTEGER NOT NULL DEFAULT 0",
    )?;
    add_column_if_missing(
        conn,
        "licenses",
        "warning_notified",
        "warning_notified INTEGER NOT NULL DEFAULT 0",
    )?;
    add_column_if_missing(
        conn,
        "notifications",
        "last_attempt_at",
        "last_attempt_at INTEGER",
    )?;
    add_column_if_missing(conn, "notifications", "error_message", "error_message TEXT")?;

    Ok(())
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> rusqlite::Result<()> {
    let present: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )?;
    if present == 0 {
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {definition}"), [])?;
    }
    Ok(())
}
