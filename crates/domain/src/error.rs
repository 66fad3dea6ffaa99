//! Domain error types.

use common::{OrderId, OrderStatus, ProductId};
use stock_store::StoreError;
use thiserror::Error;

/// Errors that can occur during order lifecycle operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The request itself is malformed (empty item list, non-positive
    /// quantity). Rejected before any storage is touched.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Demand exceeded available stock. An expected, user-facing outcome.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// A transition was attempted on an order that is not pending. Also
    /// the idempotence guard for duplicate expiration triggers.
    #[error("order {order_id} is {status}, expected pending")]
    InvalidOrderStatus {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// The referenced order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// An unexpected storage failure. Logged with context, reported
    /// generically.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::OrderNotFound(order_id) => DomainError::OrderNotFound(order_id),
            other => DomainError::Store(other),
        }
    }
}
