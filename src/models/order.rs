use serde::{Deserialize, Serialize};

/// A paid storefront order waiting to be redeemed by its buyer.
///
/// Claiming is exactly-once: the redemption path flips `claimed` with a
/// guarded UPDATE, so two concurrent redeems can never consume one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub id: i64,
    /// Normalized (trimmed, lowercased) purchase email.
    pub email: String,
    pub product: String,
    pub days: i64,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
    pub created_at: i64,
    pub claimed: bool,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub email: String,
    pub product: String,
    pub days: i64,
    pub order_number: Option<String>,
    pub customer_name: Option<String>,
}
