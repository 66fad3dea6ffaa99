//! Internal cancellation endpoint.
//!
//! Called by the expiration consumer with a static service credential,
//! not an end-user session. Already-terminal orders are reported as
//! success so at-least-once trigger delivery acknowledges cleanly.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use common::OrderId;
use domain::{DomainError, ExpirationScheduler};
use stock_store::Store;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::orders::AppState;

#[derive(serde::Serialize)]
pub struct InternalCancelResponse {
    pub status: &'static str,
}

fn authorized<S: Store, N: ExpirationScheduler>(
    state: &AppState<S, N>,
    headers: &HeaderMap,
) -> bool {
    let expected = format!("Bearer {}", state.internal_api_key);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == expected)
}

/// POST /internal/orders/{id}/cancel — service-credentialed cancellation.
#[tracing::instrument(skip(state, headers))]
pub async fn cancel<S, N>(
    State(state): State<Arc<AppState<S, N>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<InternalCancelResponse>, ApiError>
where
    S: Store,
    N: ExpirationScheduler,
{
    if !authorized(state.as_ref(), &headers) {
        return Err(ApiError::Forbidden);
    }

    let order_id = OrderId::from_uuid(id);
    match state.order_service.cancel_order(order_id).await {
        Ok(()) => Ok(Json(InternalCancelResponse { status: "canceled" })),
        // Idempotent success: the order already reached a terminal status
        // (paid, or cancelled by an earlier trigger or the buyer).
        Err(DomainError::InvalidOrderStatus { .. }) => Ok(Json(InternalCancelResponse {
            status: "already_closed",
        })),
        Err(err) => Err(err.into()),
    }
}
