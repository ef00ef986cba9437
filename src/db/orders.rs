//! Pending storefront orders, consumed exactly once by redemption.

use rusqlite::{params, OptionalExtension};

use crate::db::from_row::{FromRow, PENDING_ORDER_COLS};
use crate::db::DbPool;
use crate::error::Result;
use crate::models::{CreateOrder, PendingOrder};
use crate::util::now;

#[derive(Clone)]
pub struct OrderStore {
    pool: DbPool,
}

impl OrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a paid order awaiting redemption. The email is normalized so
    /// later claims match regardless of how the buyer typed it.
    pub fn create(&self, input: &CreateOrder) -> Result<PendingOrder> {
        let conn = self.pool.get()?;
        let email = normalize_email(&input.email);
        let created_at = now();
        conn.execute(
            "INSERT INTO pending_orders (email, product, days, order_number, customer_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                email,
                input.product,
                input.days,
                input.order_number,
                input.customer_name,
                created_at,
            ],
        )?;
        Ok(PendingOrder {
            id: conn.last_insert_rowid(),
            email,
            product: input.product.clone(),
            days: input.days,
            order_number: input.order_number.clone(),
            customer_name: input.customer_name.clone(),
            created_at,
            claimed: false,
            claimed_by: None,
            claimed_at: None,
        })
    }

    /// Atomically claim the oldest unclaimed order for an email. The
    /// `claimed = 0` guard means two concurrent redeems can never both
    /// consume the same order; the loser simply gets the next one, or None.
    pub fn claim_oldest(&self, email: &str, claimed_by: &str) -> Result<Option<PendingOrder>> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!(
                "UPDATE pending_orders
                 SET claimed = 1, claimed_by = ?2, claimed_at = ?3
                 WHERE id = (
                     SELECT id FROM pending_orders
                     WHERE email = ?1 AND claimed = 0
                     ORDER BY created_at ASC, id ASC
                     LIMIT 1
                 ) AND claimed = 0
                 RETURNING {}",
                PENDING_ORDER_COLS
            ),
            params![normalize_email(email), claimed_by, now()],
            PendingOrder::from_row,
        )
        .optional()
        .map_err(Into::into)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
