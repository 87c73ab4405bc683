pub mod health;
pub mod metrics;
pub mod orders;
pub mod simple_orders;

use domain::OrderService;
use projections::OrderQueryService;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub order_service: OrderService<S>,
    pub order_queries: OrderQueryService<S>,
    /// `"postgres"` or `"memory"`.
    pub store_kind: &'static str,
}
