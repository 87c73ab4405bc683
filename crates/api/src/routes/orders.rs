//! Order commands, search, and the order listings with lines.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{ItemId, MemberId, Money, OrderId, OrderStatus};
use domain::OrderSearch;
use order_store::OrderStore;
use projections::{OrderDto, OrderFlatDto, OrderQueryDto};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub member_id: MemberId,
    pub item_id: ItemId,
    pub count: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub member_name: Option<String>,
    pub order_status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderPlacedResponse {
    pub order_id: OrderId,
}

#[derive(Serialize)]
pub struct OrderStatusResponse {
    pub order_id: OrderId,
    pub order_status: OrderStatus,
}

/// A search hit: the loaded order with its member id and total price.
#[derive(Serialize)]
pub struct OrderSearchResponse {
    pub member_id: MemberId,
    #[serde(flatten)]
    pub order: OrderDto,
    pub total_price: Money,
}

// -- Commands --

/// POST /api/orders: place an order for one item.
#[tracing::instrument(skip(state, req))]
pub async fn place<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderPlacedResponse>), ApiError> {
    if req.count == 0 {
        return Err(ApiError::BadRequest("count must be at least 1".to_string()));
    }
    let order_id = state
        .order_service
        .place_order(req.member_id, req.item_id, req.count)
        .await?;
    Ok((StatusCode::CREATED, Json(OrderPlacedResponse { order_id })))
}

/// POST /api/orders/{id}/cancel: cancel an order and restore stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let order_id = OrderId::new(id);
    state.order_service.cancel_order(order_id).await?;
    Ok(Json(OrderStatusResponse {
        order_id,
        order_status: OrderStatus::Cancel,
    }))
}

/// POST /api/orders/{id}/ship: mark the delivery shipped.
#[tracing::instrument(skip(state))]
pub async fn ship<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.order_service.ship_order(OrderId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Queries --

/// GET /api/orders: search by member name substring and status, each hit
/// with member, delivery, lines and total price.
#[tracing::instrument(skip(state))]
pub async fn search<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<OrderSearchResponse>>, ApiError> {
    let search = OrderSearch {
        member_name: params.member_name,
        order_status: params.order_status,
    };
    let orders = state.order_service.find_orders_with_graph(&search).await?;

    let mut responses = Vec::with_capacity(orders.len());
    for order in &orders {
        responses.push(OrderSearchResponse {
            member_id: order.member_id(),
            order: OrderDto::from_order(order)?,
            total_price: order.total_price()?,
        });
    }
    Ok(Json(responses))
}

/// GET /api/orders/{id}: one fully loaded order.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderDto>, ApiError> {
    let order = state.order_service.find_order(OrderId::new(id)).await?;
    Ok(Json(OrderDto::from_order(&order)?))
}

/// GET /api/v1/orders: base traversal with the whole graph initialized.
#[tracing::instrument(skip(state))]
pub async fn v1<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderDto>>, ApiError> {
    let scope = state.order_service.read_scope().await?;
    let mut orders = scope.orders().find_all(&OrderSearch::new()).await?;
    scope.orders().initialize_graph(&mut orders).await?;
    let dtos = orders
        .iter()
        .map(OrderDto::from_order)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(dtos))
}

/// GET /api/v2/orders: base traversal, each relation initialized while the
/// order is converted.
#[tracing::instrument(skip(state))]
pub async fn v2<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderDto>>, ApiError> {
    let scope = state.order_service.read_scope().await?;
    let repository = scope.orders();
    let orders = repository.find_all(&OrderSearch::new()).await?;
    let mut dtos = Vec::with_capacity(orders.len());
    for mut order in orders {
        repository.load_member(&mut order).await?;
        repository.load_delivery(&mut order).await?;
        repository.load_order_items(&mut order).await?;
        repository.load_items(&mut order).await?;
        dtos.push(OrderDto::from_order(&order)?);
    }
    Ok(Json(dtos))
}

/// GET /api/v3/orders: one join across lines and items.
#[tracing::instrument(skip(state))]
pub async fn v3<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderDto>>, ApiError> {
    let scope = state.order_service.read_scope().await?;
    let orders = scope.orders().find_all_with_items(None).await?;
    let dtos = orders
        .iter()
        .map(OrderDto::from_order)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(dtos))
}

/// GET /api/v3.1/orders?offset&limit: paged to-one join, lines batched.
#[tracing::instrument(skip(state))]
pub async fn v3_1<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<OrderDto>>, ApiError> {
    let scope = state.order_service.read_scope().await?;
    let orders = scope
        .orders()
        .find_all_with_member_delivery(page.offset, page.limit)
        .await?;
    let dtos = orders
        .iter()
        .map(OrderDto::from_order)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(dtos))
}

/// GET /api/v4/orders: DTO roots, then one line query per root.
#[tracing::instrument(skip(state))]
pub async fn v4<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderQueryDto>>, ApiError> {
    Ok(Json(state.order_queries.find_order_query_dtos().await?))
}

/// GET /api/v5/orders: DTO roots, then lines batched by order id.
#[tracing::instrument(skip(state))]
pub async fn v5<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderQueryDto>>, ApiError> {
    Ok(Json(state.order_queries.find_all_by_dto_optimization().await?))
}

/// GET /api/v6/orders: one flat query regrouped in memory.
#[tracing::instrument(skip(state))]
pub async fn v6<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderQueryDto>>, ApiError> {
    Ok(Json(state.order_queries.find_all_by_dto_flat_grouped().await?))
}

/// GET /api/v6/orders/flat: the flat rows before regrouping.
#[tracing::instrument(skip(state))]
pub async fn v6_flat<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderFlatDto>>, ApiError> {
    Ok(Json(state.order_queries.find_all_by_dto_flat().await?))
}
