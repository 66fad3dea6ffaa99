//! Expiration scheduling for unpaid orders.
//!
//! This crate provides both sides of the delayed-cancellation path:
//! - [`DelayedTransport`]: the narrow interface to a delayed message
//!   broker (`publish` with a delay, `subscribe` with ack/nack-requeue)
//! - [`InMemoryDelayedQueue`]: a tokio-backed transport with an explicit
//!   max-attempts + dead-letter redelivery policy
//! - [`ExpirationPublisher`]: publishes one trigger per created order,
//!   delayed until the order's expiry
//! - [`ExpirationConsumer`]: processes triggers one at a time and drives
//!   cancellation through a [`Canceller`] — either in-process
//!   ([`ServiceCanceller`]) or over the internal HTTP endpoint
//!   ([`HttpCanceller`])

pub mod consumer;
pub mod http;
pub mod memory;
pub mod publisher;
pub mod transport;

pub use consumer::{CancelError, CancelOutcome, Canceller, ExpirationConsumer, ServiceCanceller};
pub use http::HttpCanceller;
pub use memory::{DeadLetter, InMemoryDelayedQueue, QueuePolicy};
pub use publisher::{ExpirationPublisher, EXPIRATION_TOPIC};
pub use transport::{Acker, DelayedTransport, Delivery, Subscription, TransportError};
