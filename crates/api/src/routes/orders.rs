//! Buyer-facing order endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{ExpirationScheduler, OrderItemRequest, OrderService};
use serde::{Deserialize, Serialize};
use stock_store::Store;
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store, N: ExpirationScheduler> {
    pub order_service: OrderService<S, N>,
    pub internal_api_key: String,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub items: Vec<OrderItemRequest>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: OrderId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

// -- Handlers --

/// POST /orders — create a pending order, reserving stock for its items.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError>
where
    S: Store,
    N: ExpirationScheduler,
{
    let receipt = state
        .order_service
        .create_order(req.user_id, req.items)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            order_id: receipt.order_id,
            expires_at: receipt.expires_at,
        }),
    ))
}

/// POST /orders/{id}/pay — accept payment for a pending order.
#[tracing::instrument(skip(state))]
pub async fn pay<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError>
where
    S: Store,
    N: ExpirationScheduler,
{
    state
        .order_service
        .pay_order(OrderId::from_uuid(id))
        .await?;
    Ok(Json(StatusResponse {
        status: "completed",
    }))
}

/// POST /orders/{id}/cancel — buyer-initiated cancellation.
#[tracing::instrument(skip(state))]
pub async fn cancel<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError>
where
    S: Store,
    N: ExpirationScheduler,
{
    state
        .order_service
        .cancel_order(OrderId::from_uuid(id))
        .await?;
    Ok(Json(StatusResponse { status: "canceled" }))
}
