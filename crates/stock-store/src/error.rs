use common::{OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the stock store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Allocation could not satisfy the requested quantity across all
    /// active warehouses. This is an expected business outcome, not an
    /// I/O failure; callers surface it to the user verbatim.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, allocatable {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// The referenced order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Stored state violated an expected invariant (unknown status text,
    /// missing ledger row for an existing reservation, negative balance).
    #[error("store integrity error: {0}")]
    Integrity(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
