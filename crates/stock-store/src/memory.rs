//! In-memory store implementation for tests and single-process runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, OrderStatus, ProductId, ReservationId, WarehouseId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::records::{NewOrder, NewOrderItem, OrderRecord, ReservationRow, StockRow};
use crate::store::{Store, StoreTx};
use crate::{Result, StoreError};

/// Stock and reserved counts for one (warehouse, product) ledger row.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockLevel {
    pub stock: i64,
    pub reserved: i64,
}

#[derive(Debug, Clone)]
struct Warehouse {
    #[allow(dead_code)]
    name: String,
    active: bool,
}

#[derive(Debug, Clone, Default)]
struct State {
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    stock: BTreeMap<(WarehouseId, ProductId), StockLevel>,
    orders: HashMap<OrderId, OrderRecord>,
    order_items: HashMap<OrderId, Vec<NewOrderItem>>,
    reservations: Vec<ReservationRow>,
}

/// In-memory store.
///
/// Transactions take the whole-state mutex for their lifetime and keep an
/// undo snapshot, so committed-state semantics match the row-locking
/// PostgreSQL backend: units of work are atomic and serialized, and a
/// dropped transaction rolls back.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a warehouse. Inactive warehouses never donate stock.
    pub async fn put_warehouse(&self, id: WarehouseId, name: &str, active: bool) {
        self.state.lock().await.warehouses.insert(
            id,
            Warehouse {
                name: name.to_string(),
                active,
            },
        );
    }

    /// Sets the physical stock of a (warehouse, product) ledger row.
    pub async fn put_stock(&self, warehouse_id: WarehouseId, product_id: ProductId, stock: i64) {
        self.state
            .lock()
            .await
            .stock
            .insert((warehouse_id, product_id), StockLevel { stock, reserved: 0 });
    }

    /// Returns the current ledger row levels, if the row exists.
    pub async fn stock_level(
        &self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Option<StockLevel> {
        self.state
            .lock()
            .await
            .stock
            .get(&(warehouse_id, product_id))
            .copied()
    }

    /// Number of live reservation fragments across all orders.
    pub async fn reservation_count(&self) -> usize {
        self.state.lock().await.reservations.len()
    }

    /// Loads an order without locking.
    pub async fn order(&self, order_id: OrderId) -> Option<OrderRecord> {
        self.state.lock().await.orders.get(&order_id).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let undo = guard.clone();
        Ok(MemoryTx {
            guard,
            undo: Some(undo),
        })
    }
}

/// A unit of work over the in-memory state.
///
/// Holds the state lock until commit/rollback/drop; the undo snapshot is
/// restored unless the transaction committed.
pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    undo: Option<State>,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            *self.guard = undo;
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<()> {
        self.guard.orders.insert(
            order.id,
            OrderRecord {
                id: order.id,
                user_id: order.user_id,
                status: order.status,
                expires_at: order.expires_at,
            },
        );
        Ok(())
    }

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<()> {
        self.guard
            .order_items
            .entry(order_id)
            .or_default()
            .extend(items.iter().cloned());
        Ok(())
    }

    async fn order_for_update(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.guard.orders.get(&order_id).cloned())
    }

    async fn set_order_status(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        let order = self
            .guard
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.status = status;
        Ok(())
    }

    async fn total_available(&mut self, product_id: ProductId) -> Result<i64> {
        let state = &*self.guard;
        let total = state
            .stock
            .iter()
            .filter(|((warehouse_id, product), _)| {
                *product == product_id && is_active(state, *warehouse_id)
            })
            .map(|(_, level)| level.stock - level.reserved)
            .sum();
        Ok(total)
    }

    async fn stock_rows_for_update(&mut self, product_id: ProductId) -> Result<Vec<StockRow>> {
        let state = &*self.guard;
        // BTreeMap iteration yields ascending warehouse ids.
        let rows = state
            .stock
            .iter()
            .filter(|((warehouse_id, product), _)| {
                *product == product_id && is_active(state, *warehouse_id)
            })
            .map(|((warehouse_id, product), level)| StockRow {
                warehouse_id: *warehouse_id,
                product_id: *product,
                stock: level.stock,
                reserved: level.reserved,
            })
            .collect();
        Ok(rows)
    }

    async fn add_reserved(
        &mut self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()> {
        let level = self.stock_row_mut(warehouse_id, product_id)?;
        if level.reserved + quantity > level.stock {
            return Err(StoreError::Integrity(format!(
                "reserve of {quantity} would exceed stock on warehouse {warehouse_id}"
            )));
        }
        level.reserved += quantity;
        Ok(())
    }

    async fn consume_stock(
        &mut self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()> {
        let level = self.stock_row_mut(warehouse_id, product_id)?;
        if level.stock < quantity || level.reserved < quantity {
            return Err(StoreError::Integrity(format!(
                "consume of {quantity} would underflow warehouse {warehouse_id}"
            )));
        }
        level.stock -= quantity;
        level.reserved -= quantity;
        Ok(())
    }

    async fn release_reserved(
        &mut self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()> {
        let level = self.stock_row_mut(warehouse_id, product_id)?;
        if level.reserved < quantity {
            return Err(StoreError::Integrity(format!(
                "release of {quantity} would underflow warehouse {warehouse_id}"
            )));
        }
        level.reserved -= quantity;
        Ok(())
    }

    async fn insert_reservation(&mut self, reservation: &ReservationRow) -> Result<()> {
        self.guard.reservations.push(reservation.clone());
        Ok(())
    }

    async fn reservations_for_update(&mut self, order_id: OrderId) -> Result<Vec<ReservationRow>> {
        Ok(self
            .guard
            .reservations
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn delete_reservation(&mut self, id: ReservationId) -> Result<()> {
        self.guard.reservations.retain(|r| r.id != id);
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        self.undo = None;
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        if let Some(undo) = self.undo.take() {
            *self.guard = undo;
        }
        Ok(())
    }
}

impl MemoryTx {
    fn stock_row_mut(
        &mut self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
    ) -> Result<&mut StockLevel> {
        self.guard
            .stock
            .get_mut(&(warehouse_id, product_id))
            .ok_or_else(|| {
                StoreError::Integrity(format!(
                    "no ledger row for warehouse {warehouse_id} product {product_id}"
                ))
            })
    }
}

fn is_active(state: &State, warehouse_id: WarehouseId) -> bool {
    state
        .warehouses
        .get(&warehouse_id)
        .is_some_and(|w| w.active)
}
