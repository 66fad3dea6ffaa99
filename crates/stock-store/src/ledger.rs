//! Stock ledger operations: allocate, commit, and release reserved stock.
//!
//! Every function here runs inside a caller-provided transaction. A failed
//! allocation may leave partial fragment writes behind in the transaction;
//! the caller's rollback discards them, which is what makes allocation
//! all-or-nothing per item and per order.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, ReservationId};

use crate::records::ReservationRow;
use crate::store::StoreTx;
use crate::{Result, StoreError};

/// Advisory availability for a product: `stock - reserved` summed over all
/// active warehouses. Unlocked; the allocation walk is the real authority.
pub async fn available<T: StoreTx>(tx: &mut T, product_id: ProductId) -> Result<i64> {
    tx.total_available(product_id).await
}

/// Claims `quantity` units of a product for an order.
///
/// Locks all active warehouse rows for the product (ascending warehouse
/// id) and walks them greedily: each row with spare capacity donates
/// `min(available, remaining)`, gets its reserved count bumped, and one
/// reservation fragment is journaled. Returns
/// [`StoreError::InsufficientStock`] when the rows are exhausted with need
/// remaining; the caller must then roll back the surrounding transaction
/// to discard the partial fragments.
pub async fn allocate<T: StoreTx>(
    tx: &mut T,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i64,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let rows = tx.stock_rows_for_update(product_id).await?;

    let mut remaining = quantity;
    for row in rows {
        if remaining == 0 {
            break;
        }
        let spare = row.available();
        if spare <= 0 {
            continue;
        }

        let take = spare.min(remaining);
        tx.add_reserved(row.warehouse_id, product_id, take).await?;
        tx.insert_reservation(&ReservationRow {
            id: ReservationId::new(),
            order_id,
            warehouse_id: row.warehouse_id,
            product_id,
            quantity: take,
            expires_at,
        })
        .await?;

        tracing::debug!(
            %order_id,
            %product_id,
            warehouse_id = %row.warehouse_id,
            take,
            remaining = remaining - take,
            "allocated stock fragment"
        );
        remaining -= take;
    }

    if remaining > 0 {
        return Err(StoreError::InsufficientStock {
            product_id,
            requested: quantity,
            available: quantity - remaining,
        });
    }

    Ok(())
}

/// Consumes an order's reservations: the payment-accepted path.
///
/// Each fragment decrements its row's `stock` and `reserved` and is then
/// deleted, so a fragment can never be consumed twice.
pub async fn commit_reservations<T: StoreTx>(tx: &mut T, order_id: OrderId) -> Result<()> {
    for fragment in tx.reservations_for_update(order_id).await? {
        tx.consume_stock(fragment.warehouse_id, fragment.product_id, fragment.quantity)
            .await?;
        tx.delete_reservation(fragment.id).await?;
    }
    Ok(())
}

/// Returns an order's reservations to the pool: the cancel/expire path.
///
/// Each fragment decrements only its row's `reserved` (stock untouched)
/// and is then deleted.
pub async fn release_reservations<T: StoreTx>(tx: &mut T, order_id: OrderId) -> Result<()> {
    for fragment in tx.reservations_for_update(order_id).await? {
        tx.release_reserved(fragment.warehouse_id, fragment.product_id, fragment.quantity)
            .await?;
        tx.delete_reservation(fragment.id).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::Store;
    use common::WarehouseId;

    async fn store_with_two_warehouses(
        product_id: ProductId,
        stock_a: i64,
        stock_b: i64,
    ) -> (MemoryStore, WarehouseId, WarehouseId) {
        let store = MemoryStore::new();
        let mut ids = [WarehouseId::new(), WarehouseId::new()];
        ids.sort();
        let [wh_a, wh_b] = ids;
        store.put_warehouse(wh_a, "A", true).await;
        store.put_warehouse(wh_b, "B", true).await;
        store.put_stock(wh_a, product_id, stock_a).await;
        store.put_stock(wh_b, product_id, stock_b).await;
        (store, wh_a, wh_b)
    }

    #[tokio::test]
    async fn allocation_splits_across_warehouses() {
        let product_id = ProductId::new();
        let (store, wh_a, wh_b) = store_with_two_warehouses(product_id, 3, 4).await;
        let order_id = OrderId::new();

        let mut tx = store.begin().await.unwrap();
        allocate(&mut tx, order_id, product_id, 5, chrono::Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let a = store.stock_level(wh_a, product_id).await.unwrap();
        let b = store.stock_level(wh_b, product_id).await.unwrap();
        assert_eq!((a.stock, a.reserved), (3, 3));
        assert_eq!((b.stock, b.reserved), (4, 2));
        assert_eq!(store.reservation_count().await, 2);
    }

    #[tokio::test]
    async fn allocation_fails_when_rows_exhausted() {
        let product_id = ProductId::new();
        let (store, _, _) = store_with_two_warehouses(product_id, 3, 4).await;

        let mut tx = store.begin().await.unwrap();
        let err = allocate(&mut tx, OrderId::new(), product_id, 8, chrono::Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 8,
                available: 7,
                ..
            }
        ));
        tx.rollback().await.unwrap();

        // Rollback discarded the partial fragments.
        assert_eq!(store.reservation_count().await, 0);
        assert_eq!(available_of(&store, product_id).await, 7);
    }

    #[tokio::test]
    async fn inactive_warehouses_do_not_donate() {
        let store = MemoryStore::new();
        let product_id = ProductId::new();
        let wh = WarehouseId::new();
        store.put_warehouse(wh, "dark", false).await;
        store.put_stock(wh, product_id, 10).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(available(&mut tx, product_id).await.unwrap(), 0);
        let err = allocate(&mut tx, OrderId::new(), product_id, 1, chrono::Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { .. }));
    }

    #[tokio::test]
    async fn release_restores_reserved_with_stock_unchanged() {
        let product_id = ProductId::new();
        let (store, wh_a, wh_b) = store_with_two_warehouses(product_id, 3, 4).await;
        let order_id = OrderId::new();

        let mut tx = store.begin().await.unwrap();
        allocate(&mut tx, order_id, product_id, 5, chrono::Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        release_reservations(&mut tx, order_id).await.unwrap();
        tx.commit().await.unwrap();

        let a = store.stock_level(wh_a, product_id).await.unwrap();
        let b = store.stock_level(wh_b, product_id).await.unwrap();
        assert_eq!((a.stock, a.reserved), (3, 0));
        assert_eq!((b.stock, b.reserved), (4, 0));
        assert_eq!(store.reservation_count().await, 0);
    }

    #[tokio::test]
    async fn commit_consumes_stock_and_reserved() {
        let product_id = ProductId::new();
        let (store, wh_a, wh_b) = store_with_two_warehouses(product_id, 3, 4).await;
        let order_id = OrderId::new();

        let mut tx = store.begin().await.unwrap();
        allocate(&mut tx, order_id, product_id, 5, chrono::Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        commit_reservations(&mut tx, order_id).await.unwrap();
        tx.commit().await.unwrap();

        let a = store.stock_level(wh_a, product_id).await.unwrap();
        let b = store.stock_level(wh_b, product_id).await.unwrap();
        assert_eq!((a.stock, a.reserved), (0, 0));
        assert_eq!((b.stock, b.reserved), (2, 0));
        assert_eq!(store.reservation_count().await, 0);
    }

    #[tokio::test]
    async fn committing_an_order_without_reservations_is_a_noop() {
        let product_id = ProductId::new();
        let (store, _, _) = store_with_two_warehouses(product_id, 3, 4).await;

        let mut tx = store.begin().await.unwrap();
        commit_reservations(&mut tx, OrderId::new()).await.unwrap();
        release_reservations(&mut tx, OrderId::new()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(available_of(&store, product_id).await, 7);
    }

    async fn available_of(store: &MemoryStore, product_id: ProductId) -> i64 {
        let mut tx = store.begin().await.unwrap();
        let n = available(&mut tx, product_id).await.unwrap();
        tx.rollback().await.unwrap();
        n
    }
}
