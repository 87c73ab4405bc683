//! Order persistence and the retrieval strategies for order listings.

use std::collections::HashMap;

use common::{DeliveryId, DeliveryStatus, ItemId, OrderId, OrderItemId, OrderStatus};
use order_store::{
    DeliveryRecord, OrderItemRecord, OrderRecord, OrderStore, Page, Sequence, UnitOfWork, Write,
};

use super::{Delivery, Order, OrderError, OrderItem, OrderSearch};
use crate::{DomainError, Item, ItemRepository, Member, Result};

/// Tuning for batched collection fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Maximum number of parent ids per batched lookup.
    pub batch_size: usize,
}

impl FetchConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 100;

    /// Creates a config; a zero batch size is raised to one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BATCH_SIZE)
    }
}

/// Repository for the order aggregate.
///
/// Offers four ways to materialize an order listing, each with a different
/// round-trip profile:
///
/// | strategy | round-trips |
/// |----------|-------------|
/// | [`find_all`](Self::find_all) + [`initialize_graph`](Self::initialize_graph) | 1 + per-order initializers |
/// | [`find_all_with_items`](Self::find_all_with_items) | 1, rows multiplied per line |
/// | [`find_all_with_member_delivery`](Self::find_all_with_member_delivery) | 1 + ceil(N / batch size) |
/// | [`find_all_with_member_delivery_unpaged`](Self::find_all_with_member_delivery_unpaged) | 1, lines unloaded |
#[derive(Clone)]
pub struct OrderRepository<S> {
    store: S,
    config: FetchConfig,
}

impl<S: OrderStore + Clone> OrderRepository<S> {
    pub fn new(store: S, config: FetchConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> FetchConfig {
        self.config
    }

    /// Ids per batched lookup, bounded by what the store accepts.
    fn chunk_size(&self) -> usize {
        self.config
            .batch_size
            .min(self.store.max_batch_size())
            .max(1)
    }

    /// Buffers a new order together with its delivery and lines.
    ///
    /// Ids are drawn from the store sequences and written back into the
    /// aggregate. Children are never saved on their own.
    #[tracing::instrument(skip(self, uow, order))]
    pub async fn save(&self, uow: &mut UnitOfWork, order: &mut Order) -> Result<OrderId> {
        if order.id().is_some() {
            return Err(OrderError::AlreadySaved.into());
        }

        let delivery_id = DeliveryId::new(self.store.next_id(Sequence::Delivery).await?);
        let order_id = OrderId::new(self.store.next_id(Sequence::Order).await?);
        let line_count = order.order_items()?.len();
        let mut line_ids = Vec::with_capacity(line_count);
        for _ in 0..line_count {
            line_ids.push(OrderItemId::new(
                self.store.next_id(Sequence::OrderItem).await?,
            ));
        }

        let delivery = order.delivery_mut()?;
        delivery.assign_id(delivery_id);
        uow.push(Write::InsertDelivery(DeliveryRecord {
            id: delivery_id,
            address: delivery.address().clone(),
            status: delivery.status(),
        }))?;

        uow.push(Write::InsertOrder(OrderRecord {
            id: order_id,
            member_id: order.member_id(),
            delivery_id,
            order_date: order.order_date(),
            status: order.status(),
        }))?;

        for (line, line_id) in order.order_items_mut()?.iter_mut().zip(line_ids) {
            line.assign_id(line_id);
            uow.push(Write::InsertOrderItem(OrderItemRecord {
                id: line_id,
                order_id,
                item_id: line.item_id(),
                order_price: line.order_price(),
                count: line.count(),
            }))?;
        }

        order.assign_id(order_id);
        tracing::debug!(%order_id, "order buffered for insert");
        Ok(order_id)
    }

    /// Buffers the order's current status, applied only if the stored status
    /// is still `expected`.
    pub fn update_status(
        &self,
        uow: &mut UnitOfWork,
        order: &Order,
        expected: OrderStatus,
    ) -> Result<()> {
        let id = saved_id(order)?;
        uow.push(Write::UpdateOrderStatus {
            id,
            expected,
            status: order.status(),
        })?;
        Ok(())
    }

    /// Buffers the order's current delivery status, applied only if the
    /// stored status is still `expected`.
    pub fn update_delivery_status(
        &self,
        uow: &mut UnitOfWork,
        order: &Order,
        expected: DeliveryStatus,
    ) -> Result<()> {
        let delivery = order.delivery()?;
        let id = delivery
            .id()
            .ok_or_else(|| DomainError::IllegalState("delivery has not been saved".to_string()))?;
        uow.push(Write::UpdateDeliveryStatus {
            id,
            expected,
            status: delivery.status(),
        })?;
        Ok(())
    }

    /// Loads the root only; every relation is left unloaded.
    pub async fn find_one(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.store.find_order(id).await?.map(Order::from_record))
    }

    /// Loads the root with member, delivery, lines and their items.
    #[tracing::instrument(skip(self))]
    pub async fn find_one_with_graph(&self, id: OrderId) -> Result<Option<Order>> {
        let Some(mut order) = self.find_one(id).await? else {
            return Ok(None);
        };
        self.load_member(&mut order).await?;
        self.load_delivery(&mut order).await?;
        self.load_order_items(&mut order).await?;

        let item_ids: Vec<ItemId> = order.order_items()?.iter().map(|l| l.item_id()).collect();
        let items = ItemRepository::new(self.store.clone())
            .find_many(&item_ids, self.chunk_size())
            .await?;
        for line in order.order_items_mut()? {
            let item = items
                .get(&line.item_id())
                .cloned()
                .ok_or_else(|| DomainError::not_found("Item", line.item_id()))?;
            line.load_item(item);
        }
        Ok(Some(order))
    }

    /// Base traversal and search: one round-trip, relations unloaded.
    #[tracing::instrument(skip(self))]
    pub async fn find_all(&self, search: &OrderSearch) -> Result<Vec<Order>> {
        let records = self.store.search_orders(&search.to_filter()).await?;
        Ok(records.into_iter().map(Order::from_record).collect())
    }

    /// Loads the member. One round-trip unless already loaded.
    pub async fn load_member(&self, order: &mut Order) -> Result<()> {
        if order.is_member_loaded() {
            return Ok(());
        }
        let id = order.member_id();
        let record = self
            .store
            .find_member(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Member", id))?;
        order.load_member(Member::from_record(record));
        Ok(())
    }

    /// Loads the delivery. One round-trip unless already loaded.
    pub async fn load_delivery(&self, order: &mut Order) -> Result<()> {
        if order.is_delivery_loaded() {
            return Ok(());
        }
        let id = order
            .delivery_id()
            .ok_or_else(|| DomainError::IllegalState("delivery has no id".to_string()))?;
        let record = self
            .store
            .find_delivery(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Delivery", id))?;
        order.load_delivery(Delivery::from_record(record));
        Ok(())
    }

    /// Loads the lines with their items unloaded. One round-trip unless
    /// already loaded.
    pub async fn load_order_items(&self, order: &mut Order) -> Result<()> {
        if order.are_order_items_loaded() {
            return Ok(());
        }
        let id = saved_id(order)?;
        let records = self.store.find_order_items(id).await?;
        order.load_order_items(records.into_iter().map(OrderItem::from_record).collect());
        Ok(())
    }

    /// Loads each line's item, one round-trip per unloaded line.
    pub async fn load_items(&self, order: &mut Order) -> Result<()> {
        for line in order.order_items_mut()? {
            if line.is_item_loaded() {
                continue;
            }
            let id = line.item_id();
            let record = self
                .store
                .find_item(id)
                .await?
                .ok_or_else(|| DomainError::not_found("Item", id))?;
            line.load_item(Item::from_record(record));
        }
        Ok(())
    }

    /// Touches every relation of every order through the single-entity
    /// initializers.
    #[tracing::instrument(skip(self, orders), fields(orders = orders.len()))]
    pub async fn initialize_graph(&self, orders: &mut [Order]) -> Result<()> {
        for order in orders.iter_mut() {
            self.load_member(order).await?;
            self.load_delivery(order).await?;
            self.load_order_items(order).await?;
            self.load_items(order).await?;
        }
        Ok(())
    }

    /// Join-fetches every order with member, delivery, lines and items in one
    /// round-trip and folds the duplicated roots back together.
    ///
    /// Windowing a join across a to-many edge cuts orders mid-way, so any
    /// page is rejected.
    #[tracing::instrument(skip(self))]
    pub async fn find_all_with_items(&self, page: Option<Page>) -> Result<Vec<Order>> {
        if let Some(page) = page {
            tracing::warn!(?page, "rejecting paged join fetch across order items");
            return Err(DomainError::InvalidArgument(
                "pagination is not supported when fetching order items by join".to_string(),
            ));
        }

        let rows = self.store.fetch_orders_with_items().await?;
        let mut orders: Vec<Order> = Vec::new();
        let mut positions: HashMap<OrderId, usize> = HashMap::new();

        for row in rows {
            let order_id = row.graph.order.id;
            let position = match positions.get(&order_id) {
                Some(position) => *position,
                None => {
                    let mut order = Order::from_graph(row.graph);
                    order.load_order_items(Vec::new());
                    orders.push(order);
                    positions.insert(order_id, orders.len() - 1);
                    orders.len() - 1
                }
            };
            let line = OrderItem::from_rows(row.line.order_item, row.line.item);
            orders[position].order_items_mut()?.push(line);
        }
        Ok(orders)
    }

    /// Join-fetches a window of orders with member and delivery, then loads
    /// their lines in batches of at most `batch_size` order ids.
    #[tracing::instrument(skip(self))]
    pub async fn find_all_with_member_delivery(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Order>> {
        let (Ok(offset), Ok(limit)) = (usize::try_from(offset), usize::try_from(limit)) else {
            return Err(DomainError::InvalidArgument(format!(
                "offset and limit must be non-negative (offset {offset}, limit {limit})"
            )));
        };

        let rows = self
            .store
            .fetch_orders_with_member_delivery(Some(Page::new(offset, limit)))
            .await?;
        let mut orders: Vec<Order> = rows.into_iter().map(Order::from_graph).collect();
        self.batch_load_order_items(&mut orders).await?;
        Ok(orders)
    }

    /// Join-fetches every order with member and delivery; lines stay unloaded.
    #[tracing::instrument(skip(self))]
    pub async fn find_all_with_member_delivery_unpaged(&self) -> Result<Vec<Order>> {
        let rows = self.store.fetch_orders_with_member_delivery(None).await?;
        Ok(rows.into_iter().map(Order::from_graph).collect())
    }

    async fn batch_load_order_items(&self, orders: &mut [Order]) -> Result<()> {
        let ids = orders
            .iter()
            .map(saved_id)
            .collect::<Result<Vec<OrderId>>>()?;

        let mut lines: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for chunk in ids.chunks(self.chunk_size()) {
            for row in self.store.fetch_order_items_in(chunk).await? {
                lines
                    .entry(row.order_item.order_id)
                    .or_default()
                    .push(OrderItem::from_rows(row.order_item, row.item));
            }
        }

        for order in orders.iter_mut() {
            let order_lines = lines.remove(&saved_id(order)?).unwrap_or_default();
            order.load_order_items(order_lines);
        }
        Ok(())
    }
}

fn saved_id(order: &Order) -> Result<OrderId> {
    order
        .id()
        .ok_or_else(|| DomainError::IllegalState("order has not been saved".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Address, Money};
    use order_store::{InMemoryOrderStore, OrderStoreExt, QueryKind};

    use crate::MemberRepository;

    /// Places `orders` orders, each with one line per item in `items`.
    async fn seed(store: &InMemoryOrderStore, orders: usize, items: usize) {
        let members = MemberRepository::new(store.clone());
        let item_repo = ItemRepository::new(store.clone());
        let repo = OrderRepository::new(store.clone(), FetchConfig::default());

        let mut uow = UnitOfWork::read_write();
        let member = members
            .register(&mut uow, "Alice", Address::new("Seoul", "1 Main St", "00001"))
            .await
            .unwrap();
        let mut catalog = Vec::new();
        for n in 0..items {
            catalog.push(
                item_repo
                    .register(&mut uow, format!("Item {n}"), Money::from_cents(100), 1000)
                    .await
                    .unwrap(),
            );
        }
        for _ in 0..orders {
            let lines = catalog
                .iter_mut()
                .map(|item| {
                    let price = item.price();
                    OrderItem::create(item, price, 1).unwrap()
                })
                .collect();
            let mut order = Order::create(
                member.clone(),
                Delivery::new(member.address().clone()),
                lines,
            )
            .unwrap();
            repo.save(&mut uow, &mut order).await.unwrap();
        }
        store.commit(uow).await.unwrap();
        store.clear_query_log();
    }

    #[tokio::test]
    async fn save_assigns_ids_to_the_whole_graph() {
        let store = InMemoryOrderStore::new();
        seed(&store, 1, 2).await;
        let repo = OrderRepository::new(store.clone(), FetchConfig::default());

        let order = repo
            .find_one_with_graph(OrderId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert!(order.delivery().unwrap().id().is_some());
        assert!(order.order_items().unwrap().iter().all(|l| l.id().is_some()));
        assert_eq!(order.member().unwrap().name(), "Alice");
    }

    #[tokio::test]
    async fn saving_twice_is_rejected() {
        let store = InMemoryOrderStore::new();
        seed(&store, 1, 1).await;
        let repo = OrderRepository::new(store.clone(), FetchConfig::default());
        let mut order = repo
            .find_one_with_graph(OrderId::new(1))
            .await
            .unwrap()
            .unwrap();

        let mut uow = UnitOfWork::read_write();
        let err = repo.save(&mut uow, &mut order).await.unwrap_err();
        assert!(matches!(err, DomainError::IllegalState(_)));
        assert!(uow.pending().is_empty());
    }

    #[tokio::test]
    async fn find_one_leaves_relations_unloaded() {
        let store = InMemoryOrderStore::new();
        seed(&store, 1, 1).await;
        let repo = OrderRepository::new(store.clone(), FetchConfig::default());

        let order = repo.find_one(OrderId::new(1)).await.unwrap().unwrap();
        assert!(!order.is_member_loaded());
        assert!(!order.is_delivery_loaded());
        assert!(!order.are_order_items_loaded());
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn base_traversal_costs_one_query_per_relation() {
        let store = InMemoryOrderStore::new();
        seed(&store, 3, 2).await;
        let repo = OrderRepository::new(store.clone(), FetchConfig::default());

        let mut orders = repo.find_all(&OrderSearch::new()).await.unwrap();
        assert_eq!(store.query_count(), 1);

        repo.initialize_graph(&mut orders).await.unwrap();
        // per order: member, delivery, lines, and one item lookup per line
        assert_eq!(store.query_count(), 1 + 3 * (3 + 2));
        assert_eq!(orders[0].total_price().unwrap(), Money::from_cents(200));
    }

    #[tokio::test]
    async fn join_fetch_deduplicates_roots() {
        let store = InMemoryOrderStore::new();
        seed(&store, 2, 3).await;
        let repo = OrderRepository::new(store.clone(), FetchConfig::default());

        let orders = repo.find_all_with_items(None).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_items().unwrap().len(), 3);
        assert_eq!(orders[0].id(), Some(OrderId::new(1)));
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn join_fetch_rejects_pages() {
        let store = InMemoryOrderStore::new();
        let repo = OrderRepository::new(store.clone(), FetchConfig::default());

        let err = repo
            .find_all_with_items(Some(Page::new(0, 10)))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn batched_fetch_splits_by_batch_size() {
        let store = InMemoryOrderStore::new();
        seed(&store, 5, 2).await;
        let repo = OrderRepository::new(store.clone(), FetchConfig::new(2));

        let orders = repo.find_all_with_member_delivery(0, 100).await.unwrap();
        assert_eq!(orders.len(), 5);
        assert!(orders.iter().all(|o| o.order_items().unwrap().len() == 2));
        assert_eq!(store.count_of(QueryKind::FetchOrdersWithMemberDelivery), 1);
        assert_eq!(store.count_of(QueryKind::FetchOrderItemsIn), 3);
    }

    #[tokio::test]
    async fn batched_fetch_honours_the_window() {
        let store = InMemoryOrderStore::new();
        seed(&store, 5, 1).await;
        let repo = OrderRepository::new(store.clone(), FetchConfig::default());

        let orders = repo.find_all_with_member_delivery(1, 2).await.unwrap();
        let ids: Vec<_> = orders.iter().filter_map(Order::id).collect();
        assert_eq!(ids, vec![OrderId::new(2), OrderId::new(3)]);
    }

    #[tokio::test]
    async fn negative_window_is_invalid() {
        let store = InMemoryOrderStore::new();
        let repo = OrderRepository::new(store.clone(), FetchConfig::default());

        for (offset, limit) in [(-1, 10), (0, -1)] {
            let err = repo
                .find_all_with_member_delivery(offset, limit)
                .await
                .unwrap_err();
            assert!(matches!(err, DomainError::InvalidArgument(_)));
        }
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn unpaged_to_one_join_leaves_lines_unloaded() {
        let store = InMemoryOrderStore::new();
        seed(&store, 2, 1).await;
        let repo = OrderRepository::new(store.clone(), FetchConfig::default());

        let orders = repo.find_all_with_member_delivery_unpaged().await.unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders[0].is_member_loaded());
        assert!(orders[0].is_delivery_loaded());
        assert!(!orders[0].are_order_items_loaded());
        assert_eq!(store.query_count(), 1);
    }

    #[test]
    fn zero_batch_size_is_raised() {
        assert_eq!(FetchConfig::new(0).batch_size, 1);
        assert_eq!(FetchConfig::default().batch_size, 100);
    }
}
