//! API server entry point.

use std::sync::Arc;

use api::auth::{Authenticator, TrustedHeaderAuthenticator};
use api::config::{Config, LogFormat};
use checkout::{PaymentDecider, RandomPaymentDecider};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use store::{CheckoutStore, InMemoryStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

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

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve<S: CheckoutStore + Clone + 'static>(
    config: &Config,
    store: S,
    metrics_handle: PrometheusHandle,
) {
    let payment: Arc<dyn PaymentDecider> =
        Arc::new(RandomPaymentDecider::new(config.payment_accept_rate));
    let authenticator: Arc<dyn Authenticator> = Arc::new(TrustedHeaderAuthenticator);

    let state = api::create_default_state(store, payment);
    let app = api::create_app(state, authenticator, metrics_handle);

    let addr = config.addr();
    tracing::info!(
        %addr,
        payment_accept_rate = config.payment_accept_rate,
        "starting API server"
    );

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
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick a store and serve
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL store");

            serve(&config, store, metrics_handle).await;
        }
        None => {
            let store = InMemoryStore::new();
            let products = api::demo::seed_catalog(&store)
                .await
                .expect("failed to seed demo catalogue");
            for product in &products {
                tracing::info!(
                    product_id = %product.id,
                    name = %product.name,
                    price = %product.unit_price,
                    quantity = product.quantity,
                    "seeded demo product"
                );
            }
            tracing::warn!("DATABASE_URL not set, using in-memory store");

            serve(&config, store, metrics_handle).await;
        }
    }
}
