//! Order listings with to-one data only: member name and delivery address.
//!
//! Each version reaches the same JSON through a different fetch strategy.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::OrderSearch;
use order_store::OrderStore;
use projections::{OrderSimpleQueryDto, SimpleOrderDto};

use super::AppState;
use crate::error::ApiError;

/// GET /api/v1/simple-orders: base traversal with the whole graph initialized.
#[tracing::instrument(skip(state))]
pub async fn v1<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<SimpleOrderDto>>, ApiError> {
    let scope = state.order_service.read_scope().await?;
    let mut orders = scope.orders().find_all(&OrderSearch::new()).await?;
    scope.orders().initialize_graph(&mut orders).await?;
    let dtos = orders
        .iter()
        .map(SimpleOrderDto::from_order)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(dtos))
}

/// GET /api/v2/simple-orders: base traversal, member and delivery loaded per
/// order.
#[tracing::instrument(skip(state))]
pub async fn v2<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<SimpleOrderDto>>, ApiError> {
    let scope = state.order_service.read_scope().await?;
    let repository = scope.orders();
    let orders = repository.find_all(&OrderSearch::new()).await?;
    let mut dtos = Vec::with_capacity(orders.len());
    for mut order in orders {
        repository.load_member(&mut order).await?;
        repository.load_delivery(&mut order).await?;
        dtos.push(SimpleOrderDto::from_order(&order)?);
    }
    Ok(Json(dtos))
}

/// GET /api/v3/simple-orders: one to-one join.
#[tracing::instrument(skip(state))]
pub async fn v3<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<SimpleOrderDto>>, ApiError> {
    let scope = state.order_service.read_scope().await?;
    let orders = scope
        .orders()
        .find_all_with_member_delivery_unpaged()
        .await?;
    let dtos = orders
        .iter()
        .map(SimpleOrderDto::from_order)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(dtos))
}

/// GET /api/v4/simple-orders: columns selected straight into the DTO.
#[tracing::instrument(skip(state))]
pub async fn v4<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderSimpleQueryDto>>, ApiError> {
    Ok(Json(state.order_queries.find_order_simple_dtos().await?))
}
