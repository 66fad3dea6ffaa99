use async_trait::async_trait;
use common::{OrderId, OrderStatus, ProductId, ReservationId, WarehouseId};

use crate::records::{NewOrder, NewOrderItem, OrderRecord, ReservationRow, StockRow};
use crate::Result;

/// Handle to a transactional store.
///
/// All implementations must be thread-safe (Send + Sync); every mutation
/// happens through a [`StoreTx`] so that one logical operation commits or
/// rolls back as a whole.
#[async_trait]
pub trait Store: Send + Sync {
    /// The unit-of-work type produced by [`Store::begin`].
    type Tx: StoreTx;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// One multi-statement unit of work.
///
/// Reads suffixed `_for_update` acquire row locks held until the
/// transaction ends; concurrent transactions touching the same rows
/// serialize on those locks. Dropping an unfinished transaction rolls it
/// back, so an early `?` return never leaves partial mutations visible.
#[async_trait]
pub trait StoreTx: Send {
    // -- Orders --

    /// Inserts a new order row.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<()>;

    /// Inserts the order's line items.
    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<()>;

    /// Loads an order row, locked for the remainder of the transaction.
    /// Returns None if the order does not exist.
    async fn order_for_update(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Updates an order's status.
    async fn set_order_status(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()>;

    // -- Stock ledger rows --

    /// Advisory sum of `stock - reserved` across all active warehouses
    /// holding the product. Unlocked: the locking allocation walk is the
    /// authority, this read only supports fail-fast checks.
    async fn total_available(&mut self, product_id: ProductId) -> Result<i64>;

    /// Locks and returns every active warehouse's ledger row for the
    /// product, ordered by ascending warehouse id. The deterministic
    /// order keeps concurrent multi-row allocations deadlock-free.
    async fn stock_rows_for_update(&mut self, product_id: ProductId) -> Result<Vec<StockRow>>;

    /// Increments a ledger row's reserved count.
    async fn add_reserved(
        &mut self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()>;

    /// Decrements both stock and reserved: physical stock is consumed.
    async fn consume_stock(
        &mut self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()>;

    /// Decrements only reserved: the claim is returned, stock untouched.
    async fn release_reserved(
        &mut self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()>;

    // -- Reservation journal --

    /// Appends one reservation fragment.
    async fn insert_reservation(&mut self, reservation: &ReservationRow) -> Result<()>;

    /// Loads all of an order's reservation fragments, locked.
    async fn reservations_for_update(&mut self, order_id: OrderId) -> Result<Vec<ReservationRow>>;

    /// Deletes one reservation fragment.
    async fn delete_reservation(&mut self, id: ReservationId) -> Result<()>;

    // -- Unit of work --

    /// Commits every mutation made through this transaction.
    async fn commit(self) -> Result<()>;

    /// Rolls back every mutation made through this transaction.
    /// Dropping the transaction without committing has the same effect.
    async fn rollback(self) -> Result<()>;
}
