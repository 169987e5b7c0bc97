//! HTTP API server with observability for the checkout service.
//!
//! Provides REST endpoints for placing and reading orders, with structured
//! logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod demo;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use checkout::{CheckoutOrchestrator, OrderService, PaymentDecider};
use metrics_exporter_prometheus::PrometheusHandle;
use store::CheckoutStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::Authenticator;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
///
/// Order routes run behind the authentication middleware.
pub fn create_app<S: CheckoutStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    authenticator: Arc<dyn Authenticator>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let orders_router = Router::new()
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/history/{id}", get(routes::orders::history::<S>))
        .layer(middleware::from_fn_with_state(
            authenticator,
            auth::authenticate,
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(routes::health::check))
        .merge(orders_router)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around a store and a payment decider.
pub fn create_default_state<S: CheckoutStore + Clone + 'static>(
    store: S,
    payment: Arc<dyn PaymentDecider>,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        checkout: CheckoutOrchestrator::new(store.clone(), payment),
        orders: OrderService::new(store),
    })
}
