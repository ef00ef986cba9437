//! Background delivery of queued "license ready" notifications.
//!
//! The poller drains [`NotificationQueue`] in small batches on an interval.
//! Delivery is at-least-once: a record is only marked delivered after the
//! notifier returns success, so a crash between send and mark produces a
//! duplicate send, never a lost one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::db::notifications::NotificationQueue;
use crate::error::Result;
use crate::models::NotificationRecord;

/// Transport for a single notification. `Err` carries a short reason that is
/// stored on the record for operators.
#[async_trait]
pub trait LicenseNotifier: Send + Sync {
    async fn deliver(&self, record: &NotificationRecord) -> std::result::Result<(), String>;
}

/// POSTs each record as JSON to a configured URL. Any non-2xx response or
/// transport error counts as a failed attempt.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl LicenseNotifier for WebhookNotifier {
    async fn deliver(&self, record: &NotificationRecord) -> std::result::Result<(), String> {
        self.client
            .post(&self.url)
            .timeout(Duration::from_secs(10))
            .json(record)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Outcome of one polling pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub delivered: usize,
    pub failed: usize,
}

pub struct NotificationPoller {
    queue: NotificationQueue,
    notifier: Arc<dyn LicenseNotifier>,
    batch_size: i64,
}

impl NotificationPoller {
    pub fn new(queue: NotificationQueue, notifier: Arc<dyn LicenseNotifier>, batch_size: i64) -> Self {
        Self {
            queue,
            notifier,
            batch_size,
        }
    }

    /// Drain one batch. Each record is settled independently so one bad
    /// record cannot wedge the rest of the batch.
    pub async fn run_once(&self) -> Result<DeliveryOutcome> {
        let batch = self.queue.poll_pending(self.batch_size)?;
        let mut outcome = DeliveryOutcome::default();

        for record in &batch {
            match self.notifier.deliver(record).await {
                Ok(()) => {
                    self.queue.mark_delivered(record.id)?;
                    outcome.delivered += 1;
                    tracing::info!(
                        "delivered notification {} for owner {}",
                        record.id,
                        record.owner_id
                    );
                }
                Err(reason) => {
                    self.queue.mark_failed(record.id, &reason)?;
                    outcome.failed += 1;
                    tracing::warn!(
                        "notification {} attempt {} failed: {}",
                        record.id,
                        record.delivery_attempts + 1,
                        reason
                    );
                }
            }
        }

        Ok(outcome)
    }

    /// Poll forever. Queue errors are logged and retried on the next tick.
    pub fn spawn(self, interval: Duration) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match self.run_once().await {
                    Ok(outcome) if outcome.delivered + outcome.failed > 0 => {
                        tracing::debug!(
                            "notification pass: {} delivered, {} failed",
                            outcome.delivered,
                            outcome.failed
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("notification pass failed: {}", e),
                }
            }
        });
    }
}
