//! HTTP surface for the stock reservation and order lifecycle engine.
//!
//! Exposes the buyer-facing order endpoints, the service-credentialed
//! internal cancellation endpoint used by the expiration consumer, and
//! health/metrics, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use domain::ExpirationScheduler;
use metrics_exporter_prometheus::PrometheusHandle;
use stock_store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, N>(state: Arc<AppState<S, N>>, metrics_handle: PrometheusHandle) -> Router
where
    S: Store + 'static,
    N: ExpirationScheduler + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S, N>))
        .route("/orders/{id}/pay", post(routes::orders::pay::<S, N>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S, N>))
        .route(
            "/internal/orders/{id}/cancel",
            post(routes::internal::cancel::<S, N>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
