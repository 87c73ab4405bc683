//! HTTP API server for order placement and order listings.
//!
//! Every listing strategy of the order repository and the order query
//! service is exposed under its own versioned route, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{FetchConfig, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use projections::OrderQueryService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;
pub use seed::seed_demo_data;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        // commands and search
        .route(
            "/api/orders",
            post(routes::orders::place::<S>).get(routes::orders::search::<S>),
        )
        .route("/api/orders/{id}", get(routes::orders::get::<S>))
        .route("/api/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/api/orders/{id}/ship", post(routes::orders::ship::<S>))
        // to-one listings
        .route("/api/v1/simple-orders", get(routes::simple_orders::v1::<S>))
        .route("/api/v2/simple-orders", get(routes::simple_orders::v2::<S>))
        .route("/api/v3/simple-orders", get(routes::simple_orders::v3::<S>))
        .route("/api/v4/simple-orders", get(routes::simple_orders::v4::<S>))
        // listings with lines
        .route("/api/v1/orders", get(routes::orders::v1::<S>))
        .route("/api/v2/orders", get(routes::orders::v2::<S>))
        .route("/api/v3/orders", get(routes::orders::v3::<S>))
        .route("/api/v3.1/orders", get(routes::orders::v3_1::<S>))
        .route("/api/v4/orders", get(routes::orders::v4::<S>))
        .route("/api/v5/orders", get(routes::orders::v5::<S>))
        .route("/api/v6/orders", get(routes::orders::v6::<S>))
        .route("/api/v6/orders/flat", get(routes::orders::v6_flat::<S>))
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

/// Creates the application state over one store.
pub fn create_state<S: OrderStore + Clone + 'static>(
    store: S,
    fetch: FetchConfig,
    store_kind: &'static str,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        order_service: OrderService::new(store.clone(), fetch),
        order_queries: OrderQueryService::new(store, fetch),
        store_kind,
    })
}
