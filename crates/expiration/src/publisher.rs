//! Publish side of the expiration scheduler.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use domain::{ExpirationNotice, ExpirationScheduler, ScheduleError};

use crate::transport::DelayedTransport;

/// Topic carrying expiration triggers.
pub const EXPIRATION_TOPIC: &str = "order.expiration";

/// Publishes one delayed expiration trigger per created order.
///
/// The delay is `expires_at - now` clamped to zero, so the trigger is
/// never delivered before the order's expiry. Publication is fire-and-
/// forget from the order transaction's perspective; failures surface as
/// [`ScheduleError`] for the lifecycle to log.
#[derive(Clone)]
pub struct ExpirationPublisher<T> {
    transport: T,
}

impl<T: DelayedTransport> ExpirationPublisher<T> {
    /// Creates a publisher over the given transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: DelayedTransport> ExpirationScheduler for ExpirationPublisher<T> {
    async fn schedule(&self, notice: &ExpirationNotice) -> Result<(), ScheduleError> {
        let payload = serde_json::to_vec(notice)
            .map_err(|err| ScheduleError::Transport(err.to_string()))?;

        // A past expiry publishes with zero delay: deliver immediately.
        let delay = (notice.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        self.transport
            .publish(EXPIRATION_TOPIC, payload, delay)
            .await
            .map_err(|err| ScheduleError::Transport(err.to_string()))
    }
}
