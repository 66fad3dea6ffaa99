//! Order lifecycle layer for the stock reservation engine.
//!
//! This crate provides:
//! - [`OrderService`]: create / pay / cancel as single-transaction units
//!   of work driving the stock ledger
//! - The [`ExpirationScheduler`] seam through which a created order's
//!   expiration trigger is published
//! - The typed [`DomainError`] surface exposed to callers

pub mod error;
pub mod expiry;
pub mod order;
pub mod service;

pub use error::DomainError;
pub use expiry::{
    ExpirationNotice, ExpirationScheduler, NullScheduler, RecordingScheduler, ScheduleError,
};
pub use order::{OrderItemRequest, OrderReceipt};
pub use service::OrderService;
