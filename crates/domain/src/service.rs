//! Order lifecycle service.

use chrono::{Duration, Utc};
use common::{OrderId, OrderStatus, ProductId, UserId};
use stock_store::{ledger, NewOrder, NewOrderItem, Store, StoreTx};

use crate::error::DomainError;
use crate::expiry::{ExpirationNotice, ExpirationScheduler};
use crate::order::{OrderItemRequest, OrderReceipt};

/// Service driving the order state machine.
///
/// Each operation runs inside one store transaction: any failure before
/// the final commit rolls back every mutation made on the way, so a
/// reader can never observe a pending order with partially-missing
/// reservations, and a failed allocation leaves no trace.
#[derive(Clone)]
pub struct OrderService<S, N> {
    store: S,
    scheduler: N,
    expiration_window: Duration,
}

impl<S: Store, N: ExpirationScheduler> OrderService<S, N> {
    /// Creates a new order service.
    ///
    /// `expiration_window` is how long a created order stays payable
    /// before its expiration trigger fires.
    pub fn new(store: S, scheduler: N, expiration_window: Duration) -> Self {
        Self {
            store,
            scheduler,
            expiration_window,
        }
    }

    /// Creates a pending order, reserving stock for every item.
    ///
    /// All-or-nothing: any item that cannot be satisfied aborts the whole
    /// order with nothing persisted. On success the expiration trigger is
    /// scheduled best-effort; a scheduling failure is logged and the
    /// committed order stands (it then relies on manual cancellation).
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        items: Vec<OrderItemRequest>,
    ) -> Result<OrderReceipt, DomainError> {
        if items.is_empty() {
            return Err(DomainError::InvalidRequest("order has no items".to_string()));
        }
        for item in &items {
            if item.quantity <= 0 {
                return Err(DomainError::InvalidRequest(format!(
                    "invalid quantity {} for product {}",
                    item.quantity, item.product_id
                )));
            }
        }

        let mut tx = self.store.begin().await?;

        // Advisory fail-fast; the locked allocation below is the authority.
        for item in &items {
            let available = ledger::available(&mut tx, item.product_id).await?;
            if available < item.quantity {
                tracing::info!(
                    product_id = %item.product_id,
                    requested = item.quantity,
                    available,
                    "insufficient stock on advisory check"
                );
                return Err(DomainError::InsufficientStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available,
                });
            }
        }

        let order_id = OrderId::new();
        let expires_at = Utc::now() + self.expiration_window;
        tx.insert_order(&NewOrder {
            id: order_id,
            user_id,
            status: OrderStatus::Pending,
            expires_at,
        })
        .await?;

        let rows: Vec<NewOrderItem> = items
            .iter()
            .map(|item| NewOrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();
        tx.insert_order_items(order_id, &rows).await?;

        for item in &items {
            ledger::allocate(&mut tx, order_id, item.product_id, item.quantity, expires_at)
                .await?;
        }

        tx.commit().await?;
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(%order_id, %expires_at, "order created");

        let notice = ExpirationNotice {
            order_id,
            user_id,
            expires_at,
        };
        if let Err(err) = self.scheduler.schedule(&notice).await {
            // The order is already committed; it simply loses its
            // auto-expiry and must be cancelled by other means.
            tracing::error!(%order_id, error = %err, "failed to schedule expiration trigger");
        }

        Ok(OrderReceipt {
            order_id,
            expires_at,
        })
    }

    /// Accepts payment: consumes the order's reservations and completes it.
    ///
    /// Expiry is advisory here — a payment that lands after the nominal
    /// expiry but before the trigger fires still wins.
    #[tracing::instrument(skip(self))]
    pub async fn pay_order(&self, order_id: OrderId) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;

        let order = tx
            .order_for_update(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;
        if !order.status.can_pay() {
            return Err(DomainError::InvalidOrderStatus {
                order_id,
                status: order.status,
            });
        }

        ledger::commit_reservations(&mut tx, order_id).await?;
        tx.set_order_status(order_id, OrderStatus::Completed).await?;
        tx.commit().await?;

        metrics::counter!("orders_paid_total").increment(1);
        tracing::info!(%order_id, "order completed");
        Ok(())
    }

    /// Cancels a pending order: releases its reservations back to the
    /// ledger.
    ///
    /// Safe to call on a non-pending order: returns
    /// [`DomainError::InvalidOrderStatus`] without side effects, which is
    /// what makes duplicate expiration triggers harmless.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<(), DomainError> {
        let mut tx = self.store.begin().await?;

        let order = tx
            .order_for_update(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;
        if !order.status.can_cancel() {
            return Err(DomainError::InvalidOrderStatus {
                order_id,
                status: order.status,
            });
        }

        ledger::release_reservations(&mut tx, order_id).await?;
        tx.set_order_status(order_id, OrderStatus::Canceled).await?;
        tx.commit().await?;

        metrics::counter!("orders_canceled_total").increment(1);
        tracing::info!(%order_id, "order canceled");
        Ok(())
    }

    /// Advisory availability for a product across active warehouses.
    #[tracing::instrument(skip(self))]
    pub async fn available(&self, product_id: ProductId) -> Result<i64, DomainError> {
        let mut tx = self.store.begin().await?;
        let available = ledger::available(&mut tx, product_id).await?;
        tx.rollback().await?;
        Ok(available)
    }
}
