//! Row types shared by the store backends.

use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, ProductId, ReservationId, UserId, WarehouseId};

/// A new order row, inserted at order-creation time.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub expires_at: DateTime<Utc>,
}

/// An order row as loaded (and locked) from storage.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub expires_at: DateTime<Utc>,
}

/// A line item inserted together with its order. Immutable once written.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// One (warehouse, product) ledger row.
///
/// `reserved` counts units currently claimed by open orders; the row
/// invariant `0 <= reserved <= stock` holds at every committed state.
#[derive(Debug, Clone, Copy)]
pub struct StockRow {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub stock: i64,
    pub reserved: i64,
}

impl StockRow {
    /// Units not yet claimed by any reservation.
    pub fn available(&self) -> i64 {
        self.stock - self.reserved
    }
}

/// One reservation fragment: a claim of `quantity` units against a single
/// warehouse's ledger row on behalf of an order. Several fragments may
/// together satisfy one order item. Deleted exactly once, by either the
/// commit path or the release path.
#[derive(Debug, Clone)]
pub struct ReservationRow {
    pub id: ReservationId,
    pub order_id: OrderId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub expires_at: DateTime<Utc>,
}
