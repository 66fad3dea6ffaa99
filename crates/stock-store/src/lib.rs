//! Transactional stock storage for the order lifecycle engine.
//!
//! This crate provides:
//! - The [`Store`]/[`StoreTx`] trait pair: multi-statement units of work
//!   over orders, warehouse stock rows, and reservation fragments
//! - The [`ledger`] operations: greedy multi-warehouse allocation and the
//!   commit/release paths that consume or return reserved stock
//! - [`MemoryStore`], an in-memory implementation used by tests and
//!   single-process deployments
//! - [`PostgresStore`], backed by PostgreSQL with `FOR UPDATE` row locks

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{MemoryStore, MemoryTx, StockLevel};
pub use postgres::{PostgresStore, PostgresTx};
pub use records::{NewOrder, NewOrderItem, OrderRecord, ReservationRow, StockRow};
pub use store::{Store, StoreTx};
