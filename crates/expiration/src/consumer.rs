//! Consume side of the expiration scheduler.

use async_trait::async_trait;
use common::OrderId;
use domain::{DomainError, ExpirationNotice, ExpirationScheduler, OrderService};
use stock_store::Store;
use thiserror::Error;

use crate::transport::{Delivery, Subscription};

/// What happened when a trigger drove cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The order was pending and is now canceled.
    Canceled,
    /// The order had already reached a terminal status; nothing to do.
    /// Treated as success so duplicate triggers ack cleanly.
    AlreadyClosed,
}

/// A failed cancellation attempt, classified for retry purposes.
#[derive(Debug, Error)]
pub enum CancelError {
    /// Retrying cannot help (unknown order, rejected request). The
    /// trigger is dropped.
    #[error("permanent cancellation failure: {0}")]
    Permanent(String),

    /// The dependency was unreachable or failed; the trigger is
    /// requeued for redelivery.
    #[error("transient cancellation failure: {0}")]
    Transient(String),
}

/// Entry point the consumer drives cancellation through.
#[async_trait]
pub trait Canceller: Send + Sync {
    /// Cancels the order, idempotently.
    async fn cancel(&self, order_id: OrderId) -> Result<CancelOutcome, CancelError>;
}

/// In-process canceller calling the order lifecycle directly.
#[derive(Clone)]
pub struct ServiceCanceller<S, N> {
    service: OrderService<S, N>,
}

impl<S: Store, N: ExpirationScheduler> ServiceCanceller<S, N> {
    /// Creates a canceller over the given service.
    pub fn new(service: OrderService<S, N>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S, N> Canceller for ServiceCanceller<S, N>
where
    S: Store,
    N: ExpirationScheduler,
{
    async fn cancel(&self, order_id: OrderId) -> Result<CancelOutcome, CancelError> {
        match self.service.cancel_order(order_id).await {
            Ok(()) => Ok(CancelOutcome::Canceled),
            Err(DomainError::InvalidOrderStatus { .. }) => Ok(CancelOutcome::AlreadyClosed),
            Err(err @ DomainError::OrderNotFound(_)) => Err(CancelError::Permanent(err.to_string())),
            Err(err @ DomainError::Store(_)) => Err(CancelError::Transient(err.to_string())),
            Err(other) => Err(CancelError::Permanent(other.to_string())),
        }
    }
}

/// Long-lived consumer of expiration triggers.
///
/// Processes one delivery at a time to bound concurrent cancellation load
/// on the ledger. Malformed payloads are acknowledged and dropped (they
/// cannot be retried profitably); transient failures are negatively
/// acknowledged for redelivery under the transport's bounded policy.
pub struct ExpirationConsumer<C> {
    subscription: Subscription,
    canceller: C,
}

impl<C: Canceller> ExpirationConsumer<C> {
    /// Creates a consumer over an open subscription.
    pub fn new(subscription: Subscription, canceller: C) -> Self {
        Self {
            subscription,
            canceller,
        }
    }

    /// Runs until the transport closes.
    pub async fn run(mut self) {
        while let Some(delivery) = self.subscription.next().await {
            self.handle(delivery).await;
        }
        tracing::info!("expiration consumer stopped: transport closed");
    }

    async fn handle(&self, delivery: Delivery) {
        let notice: ExpirationNotice = match serde_json::from_slice(delivery.payload()) {
            Ok(notice) => notice,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed expiration payload");
                metrics::counter!("expiration_triggers_malformed_total").increment(1);
                delivery.ack().await;
                return;
            }
        };

        match self.canceller.cancel(notice.order_id).await {
            Ok(outcome) => {
                tracing::info!(
                    order_id = %notice.order_id,
                    ?outcome,
                    "expiration trigger handled"
                );
                metrics::counter!("expiration_triggers_handled_total").increment(1);
                delivery.ack().await;
            }
            Err(CancelError::Permanent(reason)) => {
                tracing::warn!(
                    order_id = %notice.order_id,
                    %reason,
                    "dropping expiration trigger after permanent failure"
                );
                metrics::counter!("expiration_triggers_dropped_total").increment(1);
                delivery.ack().await;
            }
            Err(CancelError::Transient(reason)) => {
                tracing::warn!(
                    order_id = %notice.order_id,
                    attempt = delivery.attempt(),
                    %reason,
                    "requeueing expiration trigger"
                );
                metrics::counter!("expiration_triggers_requeued_total").increment(1);
                delivery.nack_requeue().await;
            }
        }
    }
}
