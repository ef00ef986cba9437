use serde::{Deserialize, Serialize};

/// Delivery attempts after which a record leaves the pending set for good.
pub const MAX_DELIVERY_ATTEMPTS: i64 = 5;

/// A durable "license ready" event. Written synchronously when a purchase
/// materializes a license; consumed at-least-once by the delivery poller.
/// Exhausted records stay in the table for operator inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub owner_id: String,
    pub license_key: String,
    pub product: String,
    pub expires_at: i64,
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub order_number: Option<String>,
    pub created_at: i64,
    pub delivered: bool,
    pub delivery_attempts: i64,
    pub last_attempt_at: Option<i64>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub owner_id: String,
    pub license_key: String,
    pub product: String,
    pub expires_at: i64,
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub order_number: Option<String>,
}
