//! DTO-level listing strategies.

use std::collections::HashMap;

use common::OrderId;
use domain::FetchConfig;
use order_store::OrderStore;

use crate::Result;
use crate::dto::{OrderFlatDto, OrderItemQueryDto, OrderQueryDto, OrderSimpleQueryDto};
use crate::regroup::regroup_flat;

/// Builds order listings straight from column projections, bypassing the
/// aggregate.
///
/// The three nested strategies return the same listing and differ only in
/// round-trips: one per order plus one, two in total, or a single flat query
/// regrouped in memory. Each listing runs in its own read-only scope.
#[derive(Clone)]
pub struct OrderQueryService<S> {
    store: S,
    config: FetchConfig,
}

impl<S: OrderStore> OrderQueryService<S> {
    pub fn new(store: S, config: FetchConfig) -> Self {
        Self { store, config }
    }

    fn chunk_size(&self) -> usize {
        self.config
            .batch_size
            .min(self.store.max_batch_size())
            .max(1)
    }

    /// One root query, then one line query per root.
    #[tracing::instrument(skip(self))]
    pub async fn find_order_query_dtos(&self) -> Result<Vec<OrderQueryDto>> {
        let store = self.store.read_only().await?;
        let summaries = store.order_summaries().await?;
        let mut orders = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let mut order = OrderQueryDto::from_summary(summary);
            order.order_items = store
                .order_lines(order.order_id)
                .await?
                .into_iter()
                .map(OrderItemQueryDto::from)
                .collect();
            orders.push(order);
        }
        Ok(orders)
    }

    /// One root query, then the lines of every root through batched IN
    /// lookups, grouped in memory by order id.
    #[tracing::instrument(skip(self))]
    pub async fn find_all_by_dto_optimization(&self) -> Result<Vec<OrderQueryDto>> {
        let store = self.store.read_only().await?;
        let mut orders: Vec<OrderQueryDto> = store
            .order_summaries()
            .await?
            .into_iter()
            .map(OrderQueryDto::from_summary)
            .collect();

        let ids: Vec<OrderId> = orders.iter().map(|o| o.order_id).collect();
        let mut lines: HashMap<OrderId, Vec<OrderItemQueryDto>> = HashMap::new();
        for chunk in ids.chunks(self.chunk_size()) {
            for row in store.order_lines_in(chunk).await? {
                lines
                    .entry(row.order_id)
                    .or_default()
                    .push(OrderItemQueryDto::from(row));
            }
        }

        for order in &mut orders {
            order.order_items = lines.remove(&order.order_id).unwrap_or_default();
        }
        Ok(orders)
    }

    /// Every (order, line) pair in a single query.
    #[tracing::instrument(skip(self))]
    pub async fn find_all_by_dto_flat(&self) -> Result<Vec<OrderFlatDto>> {
        let rows = self.store.read_only().await?.order_flat_rows().await?;
        Ok(rows.into_iter().map(OrderFlatDto::from).collect())
    }

    /// The flat query folded back into nested listings.
    ///
    /// Orders without lines do not appear, as the flat join drops them.
    pub async fn find_all_by_dto_flat_grouped(&self) -> Result<Vec<OrderQueryDto>> {
        Ok(regroup_flat(self.find_all_by_dto_flat().await?))
    }

    /// Root and to-one columns only, in one query.
    #[tracing::instrument(skip(self))]
    pub async fn find_order_simple_dtos(&self) -> Result<Vec<OrderSimpleQueryDto>> {
        let rows = self.store.read_only().await?.order_summaries().await?;
        Ok(rows.into_iter().map(OrderSimpleQueryDto::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Address, Money};
    use domain::{OrderService, OrderSearch};
    use order_store::{InMemoryOrderStore, OrderStoreExt, QueryKind, UnitOfWork};

    async fn seed(store: &InMemoryOrderStore, orders: usize) {
        let service = OrderService::new(store.clone(), FetchConfig::default());
        let mut uow = UnitOfWork::read_write();
        let member = service
            .members()
            .register(&mut uow, "Alice", Address::new("Seoul", "1 Main St", "00001"))
            .await
            .unwrap();
        let item = service
            .items()
            .register(&mut uow, "Widget", Money::from_cents(1000), 100)
            .await
            .unwrap();
        store.commit(uow).await.unwrap();

        for n in 0..orders {
            service
                .place_order(member.id(), item.id(), n as u32 + 1)
                .await
                .unwrap();
        }
        assert_eq!(
            service.find_orders(&OrderSearch::new()).await.unwrap().len(),
            orders
        );
        store.clear_query_log();
    }

    #[tokio::test]
    async fn per_root_strategy_costs_one_plus_n() {
        let store = InMemoryOrderStore::new();
        seed(&store, 4).await;
        let service = OrderQueryService::new(store.clone(), FetchConfig::default());

        let orders = service.find_order_query_dtos().await.unwrap();
        assert_eq!(orders.len(), 4);
        assert_eq!(orders[3].order_items[0].count, 4);
        assert_eq!(store.count_of(QueryKind::OrderSummaries), 1);
        assert_eq!(store.count_of(QueryKind::OrderLines), 4);
    }

    #[tokio::test]
    async fn batched_strategy_costs_two_queries() {
        let store = InMemoryOrderStore::new();
        seed(&store, 4).await;
        let service = OrderQueryService::new(store.clone(), FetchConfig::default());

        let orders = service.find_all_by_dto_optimization().await.unwrap();
        assert_eq!(orders.len(), 4);
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn batched_strategy_chunks_at_batch_size() {
        let store = InMemoryOrderStore::new();
        seed(&store, 5).await;
        let service = OrderQueryService::new(store.clone(), FetchConfig::new(2));

        let orders = service.find_all_by_dto_optimization().await.unwrap();
        assert!(orders.iter().all(|o| o.order_items.len() == 1));
        assert_eq!(store.count_of(QueryKind::OrderLinesIn), 3);
    }

    #[tokio::test]
    async fn flat_strategy_is_one_query() {
        let store = InMemoryOrderStore::new();
        seed(&store, 3).await;
        let service = OrderQueryService::new(store.clone(), FetchConfig::default());

        let grouped = service.find_all_by_dto_flat_grouped().await.unwrap();
        assert_eq!(grouped.len(), 3);
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn simple_dtos_carry_delivery_address() {
        let store = InMemoryOrderStore::new();
        seed(&store, 2).await;
        let service = OrderQueryService::new(store.clone(), FetchConfig::default());

        let orders = service.find_order_simple_dtos().await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].name, "Alice");
        assert_eq!(orders[0].address.city(), "Seoul");
    }
}
