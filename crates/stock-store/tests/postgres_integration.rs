//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p stock-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{OrderId, OrderStatus, ProductId, UserId, WarehouseId};
use serial_test::serial;
use sqlx::PgPool;
use stock_store::{ledger, NewOrder, PostgresStore, Store, StoreError, StoreTx};
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE stock_reservation, order_items, orders, warehouse_stock, warehouses")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

async fn seed_warehouse(store: &PostgresStore, active: bool) -> WarehouseId {
    let id = WarehouseId::new();
    sqlx::query("INSERT INTO warehouses (id, name, active) VALUES ($1, $2, $3)")
        .bind(id.as_uuid())
        .bind("test-warehouse")
        .bind(active)
        .execute(store.pool())
        .await
        .unwrap();
    id
}

async fn seed_stock(store: &PostgresStore, warehouse_id: WarehouseId, product_id: ProductId, stock: i64) {
    sqlx::query(
        "INSERT INTO warehouse_stock (warehouse_id, product_id, stock, reserved) VALUES ($1, $2, $3, 0)",
    )
    .bind(warehouse_id.as_uuid())
    .bind(product_id.as_uuid())
    .bind(stock)
    .execute(store.pool())
    .await
    .unwrap();
}

async fn stock_level(
    store: &PostgresStore,
    warehouse_id: WarehouseId,
    product_id: ProductId,
) -> (i64, i64) {
    sqlx::query_as::<_, (i64, i64)>(
        "SELECT stock, reserved FROM warehouse_stock WHERE warehouse_id = $1 AND product_id = $2",
    )
    .bind(warehouse_id.as_uuid())
    .bind(product_id.as_uuid())
    .fetch_one(store.pool())
    .await
    .unwrap()
}

#[tokio::test]
#[serial]
async fn allocation_splits_and_round_trips() {
    let store = get_test_store().await;
    let product_id = ProductId::new();
    let mut warehouses = [
        seed_warehouse(&store, true).await,
        seed_warehouse(&store, true).await,
    ];
    warehouses.sort();
    let [wh_a, wh_b] = warehouses;
    seed_stock(&store, wh_a, product_id, 3).await;
    seed_stock(&store, wh_b, product_id, 4).await;

    let order_id = OrderId::new();
    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&NewOrder {
        id: order_id,
        user_id: UserId::new(),
        status: OrderStatus::Pending,
        expires_at: Utc::now(),
    })
    .await
    .unwrap();
    ledger::allocate(&mut tx, order_id, product_id, 5, Utc::now())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(stock_level(&store, wh_a, product_id).await, (3, 3));
    assert_eq!(stock_level(&store, wh_b, product_id).await, (4, 2));

    // Release returns the claim with stock untouched.
    let mut tx = store.begin().await.unwrap();
    ledger::release_reservations(&mut tx, order_id).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(stock_level(&store, wh_a, product_id).await, (3, 0));
    assert_eq!(stock_level(&store, wh_b, product_id).await, (4, 0));
}

#[tokio::test]
#[serial]
async fn commit_consumes_physical_stock() {
    let store = get_test_store().await;
    let product_id = ProductId::new();
    let warehouse_id = seed_warehouse(&store, true).await;
    seed_stock(&store, warehouse_id, product_id, 10).await;

    let order_id = OrderId::new();
    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&NewOrder {
        id: order_id,
        user_id: UserId::new(),
        status: OrderStatus::Pending,
        expires_at: Utc::now(),
    })
    .await
    .unwrap();
    ledger::allocate(&mut tx, order_id, product_id, 4, Utc::now())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    ledger::commit_reservations(&mut tx, order_id).await.unwrap();
    tx.set_order_status(order_id, OrderStatus::Completed)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(stock_level(&store, warehouse_id, product_id).await, (6, 0));

    let fragments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM stock_reservation WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(fragments, 0);
}

#[tokio::test]
#[serial]
async fn insufficient_stock_rolls_back_partial_fragments() {
    let store = get_test_store().await;
    let product_id = ProductId::new();
    let warehouse_id = seed_warehouse(&store, true).await;
    seed_stock(&store, warehouse_id, product_id, 2).await;

    let order_id = OrderId::new();
    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&NewOrder {
        id: order_id,
        user_id: UserId::new(),
        status: OrderStatus::Pending,
        expires_at: Utc::now(),
    })
    .await
    .unwrap();
    let err = ledger::allocate(&mut tx, order_id, product_id, 5, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InsufficientStock { .. }));
    tx.rollback().await.unwrap();

    assert_eq!(stock_level(&store, warehouse_id, product_id).await, (2, 0));
    let fragments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_reservation")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(fragments, 0);
}

#[tokio::test]
#[serial]
async fn inactive_warehouses_are_excluded() {
    let store = get_test_store().await;
    let product_id = ProductId::new();
    let warehouse_id = seed_warehouse(&store, false).await;
    seed_stock(&store, warehouse_id, product_id, 50).await;

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.total_available(product_id).await.unwrap(), 0);
    assert!(tx.stock_rows_for_update(product_id).await.unwrap().is_empty());
    tx.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
async fn check_constraint_guards_the_ledger_invariant() {
    let store = get_test_store().await;
    let product_id = ProductId::new();
    let warehouse_id = seed_warehouse(&store, true).await;
    seed_stock(&store, warehouse_id, product_id, 1).await;

    // Driving reserved above stock trips the row CHECK.
    let mut tx = store.begin().await.unwrap();
    let err = tx.add_reserved(warehouse_id, product_id, 2).await.unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));
}

#[tokio::test]
#[serial]
async fn order_lock_and_status_update() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.order_for_update(order_id).await.unwrap().is_none());
    tx.insert_order(&NewOrder {
        id: order_id,
        user_id: UserId::new(),
        status: OrderStatus::Pending,
        expires_at: Utc::now(),
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let order = tx.order_for_update(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    tx.set_order_status(order_id, OrderStatus::Canceled)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let order = tx.order_for_update(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Canceled);
    tx.rollback().await.unwrap();
}
