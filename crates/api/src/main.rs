//! Engine entry point: wires store, delayed queue, consumer, and server.

use std::sync::Arc;

use api::{AppState, Config};
use domain::OrderService;
use expiration::{
    DelayedTransport, ExpirationConsumer, ExpirationPublisher, HttpCanceller, InMemoryDelayedQueue,
    EXPIRATION_TOPIC,
};
use metrics_exporter_prometheus::PrometheusHandle;
use stock_store::{MemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn run<S>(store: S, config: Config, metrics_handle: PrometheusHandle)
where
    S: Store + 'static,
{
    // Delayed expiration queue shared by the publisher (order creation)
    // and the consumer task.
    let queue = InMemoryDelayedQueue::default();
    let order_service = OrderService::new(
        store,
        ExpirationPublisher::new(queue.clone()),
        config.expiration_window(),
    );

    // The consumer drives cancellation through the internal endpoint with
    // the static service credential, one trigger at a time.
    let subscription = queue
        .subscribe(EXPIRATION_TOPIC)
        .await
        .expect("failed to subscribe to the expiration topic");
    let canceller = HttpCanceller::new(
        format!("http://127.0.0.1:{}", config.port),
        config.internal_api_key.clone(),
    )
    .expect("failed to build the internal HTTP client");
    tokio::spawn(ExpirationConsumer::new(subscription, canceller).run());

    let state = Arc::new(AppState {
        order_service,
        internal_api_key: config.internal_api_key.clone(),
    });
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting order engine");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    match config.database_url.clone() {
        Some(database_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&database_url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresStore::new(pool);
            tracing::info!("running database migrations");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            run(store, config, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using the in-memory store");
            run(MemoryStore::new(), config, metrics_handle).await;
        }
    }
}
