//! Expiration trigger seam.
//!
//! The lifecycle publishes one [`ExpirationNotice`] per created order; a
//! scheduler implementation delivers it back (at least once) no earlier
//! than the order's expiry so the consumer can auto-cancel stale orders.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The payload of an expiration trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationNotice {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

/// Error publishing an expiration trigger.
///
/// Publication is best-effort from the order-creation path's perspective:
/// the caller logs this and keeps the committed order.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("transport error: {0}")]
    Transport(String),
}

/// Trait for scheduling delayed expiration triggers.
#[async_trait]
pub trait ExpirationScheduler: Send + Sync {
    /// Schedules delivery of the notice no earlier than `notice.expires_at`.
    async fn schedule(&self, notice: &ExpirationNotice) -> Result<(), ScheduleError>;
}

/// Scheduler that drops every notice. For deployments and tests that do
/// not want auto-expiry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScheduler;

#[async_trait]
impl ExpirationScheduler for NullScheduler {
    async fn schedule(&self, _notice: &ExpirationNotice) -> Result<(), ScheduleError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    notices: Vec<ExpirationNotice>,
    fail_on_schedule: bool,
}

/// Recording scheduler for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    state: Arc<RwLock<RecordingState>>,
}

impl RecordingScheduler {
    /// Creates a new recording scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the scheduler to fail on subsequent schedule calls.
    pub fn set_fail_on_schedule(&self, fail: bool) {
        self.state.write().unwrap().fail_on_schedule = fail;
    }

    /// Returns all notices scheduled so far.
    pub fn notices(&self) -> Vec<ExpirationNotice> {
        self.state.read().unwrap().notices.clone()
    }
}

#[async_trait]
impl ExpirationScheduler for RecordingScheduler {
    async fn schedule(&self, notice: &ExpirationNotice) -> Result<(), ScheduleError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_schedule {
            return Err(ScheduleError::Transport("scheduler unavailable".to_string()));
        }
        state.notices.push(notice.clone());
        Ok(())
    }
}
