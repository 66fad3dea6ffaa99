//! The narrow interface to a delayed message transport.
//!
//! The broker itself is an external collaborator; this trait captures the
//! only capabilities the engine needs from it: publish a payload that
//! becomes deliverable after a delay, and consume deliveries that can be
//! acknowledged or negatively acknowledged with requeue.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from the delayed transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The topic already has a live subscriber.
    #[error("topic '{0}' already has a subscriber")]
    AlreadySubscribed(String),

    /// The transport is shut down.
    #[error("transport closed")]
    Closed,
}

/// A delayed message transport.
#[async_trait]
pub trait DelayedTransport: Send + Sync {
    /// Publishes a payload that becomes deliverable after `delay`.
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        delay: Duration,
    ) -> Result<(), TransportError>;

    /// Subscribes to a topic. One subscriber per topic.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError>;
}

/// A stream of deliveries for one topic.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<Delivery>,
}

impl Subscription {
    /// Creates a subscription over a delivery channel. Used by transport
    /// implementations.
    pub fn new(receiver: mpsc::Receiver<Delivery>) -> Self {
        Self { receiver }
    }

    /// Waits for the next delivery. Returns None once the transport is
    /// closed and the queue is drained.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

/// Settles a delivery. Implemented by each transport.
#[async_trait]
pub trait Acker: Send {
    /// Acknowledges the delivery; the message is done.
    async fn ack(self: Box<Self>);

    /// Negatively acknowledges the delivery, requeueing it for another
    /// attempt (subject to the transport's redelivery policy).
    async fn nack_requeue(self: Box<Self>);
}

/// One delivered message.
///
/// Must be settled exactly once via [`Delivery::ack`] or
/// [`Delivery::nack_requeue`].
pub struct Delivery {
    payload: Vec<u8>,
    attempt: u32,
    acker: Box<dyn Acker>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .field("attempt", &self.attempt)
            .finish()
    }
}

impl Delivery {
    /// Creates a delivery. Used by transport implementations.
    pub fn new(payload: Vec<u8>, attempt: u32, acker: Box<dyn Acker>) -> Self {
        Self {
            payload,
            attempt,
            acker,
        }
    }

    /// The message payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// 1-based delivery attempt counter; greater than 1 on redelivery.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Acknowledges the delivery.
    pub async fn ack(self) {
        self.acker.ack().await;
    }

    /// Negatively acknowledges the delivery with requeue.
    pub async fn nack_requeue(self) {
        self.acker.nack_requeue().await;
    }
}
