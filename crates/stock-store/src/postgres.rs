//! PostgreSQL-backed store implementation.
//!
//! Row locks (`FOR UPDATE`) on `warehouse_stock` are the serialization
//! point for allocation; locks are always taken in ascending warehouse-id
//! order so concurrent multi-row allocations cannot deadlock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use common::{OrderId, OrderStatus, ProductId, ReservationId, UserId, WarehouseId};

use crate::records::{NewOrder, NewOrderItem, OrderRecord, ReservationRow, StockRow};
use crate::store::{Store, StoreTx};
use crate::{Result, StoreError};

/// PostgreSQL store over a connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        Ok(PostgresTx {
            tx: self.pool.begin().await?,
        })
    }
}

/// A unit of work over one PostgreSQL transaction.
///
/// Dropping without commit rolls back (inherited from `sqlx::Transaction`).
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn row_to_order(row: PgRow) -> Result<OrderRecord> {
    let status_text: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status_text)
        .ok_or_else(|| StoreError::Integrity(format!("unknown order status '{status_text}'")))?;

    Ok(OrderRecord {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        status,
        expires_at: row.try_get::<DateTime<Utc>, _>("expires_at")?,
    })
}

fn row_to_reservation(row: PgRow) -> Result<ReservationRow> {
    Ok(ReservationRow {
        id: ReservationId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        warehouse_id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: row.try_get("quantity")?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn insert_order(&mut self, order: &NewOrder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.expires_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<()> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(item.quantity)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn order_for_update(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, status, expires_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn set_order_status(&mut self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order_id));
        }
        Ok(())
    }

    async fn total_available(&mut self, product_id: ProductId) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(ws.stock - ws.reserved), 0)::BIGINT
            FROM warehouse_stock ws
            JOIN warehouses w ON w.id = ws.warehouse_id
            WHERE ws.product_id = $1 AND w.active
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(total)
    }

    async fn stock_rows_for_update(&mut self, product_id: ProductId) -> Result<Vec<StockRow>> {
        let rows = sqlx::query(
            r#"
            SELECT ws.warehouse_id, ws.product_id, ws.stock, ws.reserved
            FROM warehouse_stock ws
            JOIN warehouses w ON w.id = ws.warehouse_id
            WHERE ws.product_id = $1 AND w.active
            ORDER BY ws.warehouse_id ASC
            FOR UPDATE OF ws
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StockRow {
                    warehouse_id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    stock: row.try_get("stock")?,
                    reserved: row.try_get("reserved")?,
                })
            })
            .collect()
    }

    async fn add_reserved(
        &mut self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()> {
        self.update_stock_row(
            "UPDATE warehouse_stock SET reserved = reserved + $3
             WHERE warehouse_id = $1 AND product_id = $2",
            warehouse_id,
            product_id,
            quantity,
        )
        .await
    }

    async fn consume_stock(
        &mut self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()> {
        self.update_stock_row(
            "UPDATE warehouse_stock SET stock = stock - $3, reserved = reserved - $3
             WHERE warehouse_id = $1 AND product_id = $2",
            warehouse_id,
            product_id,
            quantity,
        )
        .await
    }

    async fn release_reserved(
        &mut self,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()> {
        self.update_stock_row(
            "UPDATE warehouse_stock SET reserved = reserved - $3
             WHERE warehouse_id = $1 AND product_id = $2",
            warehouse_id,
            product_id,
            quantity,
        )
        .await
    }

    async fn insert_reservation(&mut self, reservation: &ReservationRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_reservation (id, order_id, warehouse_id, product_id, quantity, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.order_id.as_uuid())
        .bind(reservation.warehouse_id.as_uuid())
        .bind(reservation.product_id.as_uuid())
        .bind(reservation.quantity)
        .bind(reservation.expires_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn reservations_for_update(&mut self, order_id: OrderId) -> Result<Vec<ReservationRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, warehouse_id, product_id, quantity, expires_at
            FROM stock_reservation
            WHERE order_id = $1
            ORDER BY warehouse_id ASC
            FOR UPDATE
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_reservation).collect()
    }

    async fn delete_reservation(&mut self, id: ReservationId) -> Result<()> {
        sqlx::query("DELETE FROM stock_reservation WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

impl PostgresTx {
    async fn update_stock_row(
        &mut self,
        sql: &str,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()> {
        let result = sqlx::query(sql)
            .bind(warehouse_id.as_uuid())
            .bind(product_id.as_uuid())
            .bind(quantity)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Integrity(format!(
                "no ledger row for warehouse {warehouse_id} product {product_id}"
            )));
        }
        Ok(())
    }
}
