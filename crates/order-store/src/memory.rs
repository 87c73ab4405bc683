use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{DeliveryId, ItemId, MemberId, OrderId, OrderItemId};
use tokio::sync::{OwnedRwLockReadGuard, RwLock, RwLockReadGuard};

use crate::query::{OrderFilter, Page, Sequence};
use crate::record::{
    DeliveryRecord, ItemRecord, MemberRecord, OrderFetchRow, OrderFlatRow, OrderGraphRow,
    OrderItemRecord, OrderItemRow, OrderLineRow, OrderRecord, OrderSummaryRow,
};
use crate::store::{OrderStore, QueryKind, check_batch_size};
use crate::unit_of_work::Write;
use crate::{Result, StoreError};

#[derive(Debug, Clone, Default)]
struct Tables {
    members: BTreeMap<MemberId, MemberRecord>,
    items: BTreeMap<ItemId, ItemRecord>,
    deliveries: BTreeMap<DeliveryId, DeliveryRecord>,
    orders: BTreeMap<OrderId, OrderRecord>,
    order_items: BTreeMap<OrderItemId, OrderItemRecord>,
}

impl Tables {
    fn apply(&mut self, write: Write) -> Result<()> {
        match write {
            Write::InsertMember(member) => {
                self.members.insert(member.id, member);
            }
            Write::InsertItem(item) => {
                self.items.insert(item.id, item);
            }
            Write::RemoveItemStock { id, quantity } => {
                let item = self.items.get_mut(&id).ok_or(StoreError::RowNotFound {
                    table: "items",
                    id: id.as_i64(),
                })?;
                item.stock_quantity = item.stock_quantity.checked_sub(quantity).ok_or(
                    StoreError::InsufficientStock {
                        item_id: id,
                        requested: quantity,
                        available: item.stock_quantity,
                    },
                )?;
            }
            Write::AddItemStock { id, quantity } => {
                let item = self.items.get_mut(&id).ok_or(StoreError::RowNotFound {
                    table: "items",
                    id: id.as_i64(),
                })?;
                item.stock_quantity = item.stock_quantity.saturating_add(quantity);
            }
            Write::InsertDelivery(delivery) => {
                self.deliveries.insert(delivery.id, delivery);
            }
            Write::InsertOrder(order) => {
                self.orders.insert(order.id, order);
            }
            Write::InsertOrderItem(order_item) => {
                self.order_items.insert(order_item.id, order_item);
            }
            Write::UpdateOrderStatus {
                id,
                expected,
                status,
            } => {
                let order = self.orders.get_mut(&id).ok_or(StoreError::RowNotFound {
                    table: "orders",
                    id: id.as_i64(),
                })?;
                if order.status != expected {
                    return Err(StoreError::Conflict {
                        table: "orders",
                        id: id.as_i64(),
                        expected: expected.as_str(),
                        found: order.status.to_string(),
                    });
                }
                order.status = status;
            }
            Write::UpdateDeliveryStatus {
                id,
                expected,
                status,
            } => {
                let delivery = self
                    .deliveries
                    .get_mut(&id)
                    .ok_or(StoreError::RowNotFound {
                        table: "deliveries",
                        id: id.as_i64(),
                    })?;
                if delivery.status != expected {
                    return Err(StoreError::Conflict {
                        table: "deliveries",
                        id: id.as_i64(),
                        expected: expected.as_str(),
                        found: delivery.status.to_string(),
                    });
                }
                delivery.status = status;
            }
        }
        Ok(())
    }

    /// Inner join of an order with its member and delivery.
    fn graph(&self, order: &OrderRecord) -> Option<OrderGraphRow> {
        let member = self.members.get(&order.member_id)?;
        let delivery = self.deliveries.get(&order.delivery_id)?;
        Some(OrderGraphRow {
            order: order.clone(),
            member: member.clone(),
            delivery: delivery.clone(),
        })
    }

    /// Lines of one order joined with their items, in line order.
    fn lines_of(&self, order_id: OrderId) -> impl Iterator<Item = OrderItemRow> + '_ {
        self.order_items
            .values()
            .filter(move |oi| oi.order_id == order_id)
            .filter_map(move |oi| {
                self.items.get(&oi.item_id).map(|item| OrderItemRow {
                    order_item: oi.clone(),
                    item: item.clone(),
                })
            })
    }

    fn summary(&self, order: &OrderRecord) -> Option<OrderSummaryRow> {
        let graph = self.graph(order)?;
        Some(OrderSummaryRow {
            order_id: order.id,
            member_name: graph.member.name,
            order_date: order.order_date,
            status: order.status,
            address: graph.delivery.address,
        })
    }
}

fn line_row(row: &OrderItemRow) -> OrderLineRow {
    OrderLineRow {
        order_id: row.order_item.order_id,
        item_name: row.item.name.clone(),
        order_price: row.order_item.order_price,
        count: row.order_item.count,
    }
}

/// Tables as seen by one read: a fresh read lock, or the guard a read-only
/// scope holds for its whole lifetime.
enum TablesRef<'a> {
    Live(RwLockReadGuard<'a, Tables>),
    Snapshot(&'a Tables),
}

impl Deref for TablesRef<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        match self {
            TablesRef::Live(guard) => guard,
            TablesRef::Snapshot(tables) => tables,
        }
    }
}

/// In-memory order store for testing.
///
/// Behaves like the PostgreSQL implementation, including join semantics and
/// result ordering, and records every round-trip in a query log so tests can
/// assert on fetch cost.
///
/// A read-only scope holds one read guard on the tables until its last clone
/// is dropped, so writers wait for it to end.
#[derive(Clone)]
pub struct InMemoryOrderStore {
    tables: Arc<RwLock<Tables>>,
    snapshot: Option<Arc<OwnedRwLockReadGuard<Tables>>>,
    sequences: Arc<Mutex<HashMap<Sequence, i64>>>,
    query_log: Arc<Mutex<Vec<QueryKind>>>,
    max_batch_size: usize,
}

impl InMemoryOrderStore {
    /// Default IN-list limit.
    pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_max_batch_size(Self::DEFAULT_MAX_BATCH_SIZE)
    }

    /// Creates a store whose multi-key lookups accept at most `max` keys.
    pub fn with_max_batch_size(max: usize) -> Self {
        Self {
            tables: Arc::default(),
            snapshot: None,
            sequences: Arc::default(),
            query_log: Arc::default(),
            max_batch_size: max,
        }
    }

    /// Returns every round-trip performed so far, in order.
    pub fn query_log(&self) -> Vec<QueryKind> {
        self.query_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Returns the number of round-trips performed so far.
    pub fn query_count(&self) -> usize {
        self.query_log.lock().map(|log| log.len()).unwrap_or(0)
    }

    /// Returns the number of round-trips of one kind.
    pub fn count_of(&self, kind: QueryKind) -> usize {
        self.query_log
            .lock()
            .map(|log| log.iter().filter(|k| **k == kind).count())
            .unwrap_or(0)
    }

    /// Forgets the round-trips recorded so far.
    pub fn clear_query_log(&self) {
        if let Ok(mut log) = self.query_log.lock() {
            log.clear();
        }
    }

    async fn read(&self) -> TablesRef<'_> {
        match &self.snapshot {
            Some(guard) => TablesRef::Snapshot(guard),
            None => TablesRef::Live(self.tables.read().await),
        }
    }

    fn record(&self, kind: QueryKind) {
        kind.record();
        if let Ok(mut log) = self.query_log.lock() {
            log.push(kind);
        }
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn next_id(&self, sequence: Sequence) -> Result<i64> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        self.record(QueryKind::NextId);
        let mut sequences = self
            .sequences
            .lock()
            .map_err(|_| StoreError::Corrupt("sequence table poisoned".to_string()))?;
        let next = sequences.entry(sequence).or_insert(0);
        *next += 1;
        Ok(*next)
    }

    async fn apply(&self, writes: Vec<Write>) -> Result<()> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        self.record(QueryKind::Apply);
        let mut tables = self.tables.write().await;

        // Stage on a copy so a failing write leaves the tables untouched
        let mut staged = tables.clone();
        for write in writes {
            staged.apply(write)?;
        }
        *tables = staged;
        Ok(())
    }

    async fn read_only(&self) -> Result<Self> {
        if self.is_read_only() {
            return Ok(self.clone());
        }
        let guard = self.tables.clone().read_owned().await;
        Ok(Self {
            snapshot: Some(Arc::new(guard)),
            ..self.clone()
        })
    }

    fn is_read_only(&self) -> bool {
        self.snapshot.is_some()
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn find_member(&self, id: MemberId) -> Result<Option<MemberRecord>> {
        self.record(QueryKind::FindMember);
        Ok(self.read().await.members.get(&id).cloned())
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<ItemRecord>> {
        self.record(QueryKind::FindItem);
        Ok(self.read().await.items.get(&id).cloned())
    }

    async fn find_items(&self, ids: &[ItemId]) -> Result<Vec<ItemRecord>> {
        check_batch_size(ids.len(), self.max_batch_size)?;
        self.record(QueryKind::FindItems);
        let tables = self.read().await;
        Ok(tables
            .items
            .values()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect())
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        self.record(QueryKind::FindOrder);
        Ok(self.read().await.orders.get(&id).cloned())
    }

    async fn find_delivery(&self, id: DeliveryId) -> Result<Option<DeliveryRecord>> {
        self.record(QueryKind::FindDelivery);
        Ok(self.read().await.deliveries.get(&id).cloned())
    }

    async fn find_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>> {
        self.record(QueryKind::FindOrderItems);
        let tables = self.read().await;
        Ok(tables
            .order_items
            .values()
            .filter(|oi| oi.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn search_orders(&self, filter: &OrderFilter) -> Result<Vec<OrderRecord>> {
        self.record(QueryKind::SearchOrders);
        let tables = self.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|order| {
                tables
                    .members
                    .get(&order.member_id)
                    .is_some_and(|member| filter.matches(&member.name, order.status))
            })
            .take(filter.max_results)
            .cloned()
            .collect())
    }

    async fn fetch_orders_with_member_delivery(
        &self,
        page: Option<Page>,
    ) -> Result<Vec<OrderGraphRow>> {
        self.record(QueryKind::FetchOrdersWithMemberDelivery);
        let tables = self.read().await;
        let rows = tables.orders.values().filter_map(|order| tables.graph(order));

        Ok(match page {
            Some(page) => rows.skip(page.offset).take(page.limit).collect(),
            None => rows.collect(),
        })
    }

    async fn fetch_orders_with_items(&self) -> Result<Vec<OrderFetchRow>> {
        self.record(QueryKind::FetchOrdersWithItems);
        let tables = self.read().await;
        let mut rows = Vec::new();
        for order in tables.orders.values() {
            let Some(graph) = tables.graph(order) else {
                continue;
            };
            for line in tables.lines_of(order.id) {
                rows.push(OrderFetchRow {
                    graph: graph.clone(),
                    line,
                });
            }
        }
        Ok(rows)
    }

    async fn fetch_order_items_in(&self, order_ids: &[OrderId]) -> Result<Vec<OrderItemRow>> {
        check_batch_size(order_ids.len(), self.max_batch_size)?;
        self.record(QueryKind::FetchOrderItemsIn);
        let tables = self.read().await;
        Ok(tables
            .order_items
            .values()
            .filter(|oi| order_ids.contains(&oi.order_id))
            .filter_map(|oi| {
                tables.items.get(&oi.item_id).map(|item| OrderItemRow {
                    order_item: oi.clone(),
                    item: item.clone(),
                })
            })
            .collect())
    }

    async fn order_summaries(&self) -> Result<Vec<OrderSummaryRow>> {
        self.record(QueryKind::OrderSummaries);
        let tables = self.read().await;
        Ok(tables
            .orders
            .values()
            .filter_map(|order| tables.summary(order))
            .collect())
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLineRow>> {
        self.record(QueryKind::OrderLines);
        let tables = self.read().await;
        Ok(tables.lines_of(order_id).map(|row| line_row(&row)).collect())
    }

    async fn order_lines_in(&self, order_ids: &[OrderId]) -> Result<Vec<OrderLineRow>> {
        check_batch_size(order_ids.len(), self.max_batch_size)?;
        self.record(QueryKind::OrderLinesIn);
        let tables = self.read().await;
        Ok(tables
            .order_items
            .values()
            .filter(|oi| order_ids.contains(&oi.order_id))
            .filter_map(|oi| {
                tables.items.get(&oi.item_id).map(|item| OrderLineRow {
                    order_id: oi.order_id,
                    item_name: item.name.clone(),
                    order_price: oi.order_price,
                    count: oi.count,
                })
            })
            .collect())
    }

    async fn order_flat_rows(&self) -> Result<Vec<OrderFlatRow>> {
        self.record(QueryKind::OrderFlatRows);
        let tables = self.read().await;
        let mut rows = Vec::new();
        for order in tables.orders.values() {
            let Some(summary) = tables.summary(order) else {
                continue;
            };
            for line in tables.lines_of(order.id) {
                rows.push(OrderFlatRow {
                    order_id: summary.order_id,
                    member_name: summary.member_name.clone(),
                    order_date: summary.order_date,
                    status: summary.status,
                    address: summary.address.clone(),
                    item_name: line.item.name,
                    order_price: line.order_item.order_price,
                    count: line.order_item.count,
                });
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OrderStoreExt;
    use crate::unit_of_work::UnitOfWork;
    use chrono::Utc;
    use common::{Address, DeliveryStatus, Money, OrderStatus};

    fn address() -> Address {
        Address::new("Seoul", "123 Main St", "00001")
    }

    /// Seeds one member, two items and `orders` orders with two lines each.
    async fn seed(store: &InMemoryOrderStore, orders: i64) {
        let mut uow = UnitOfWork::read_write();
        uow.push(Write::InsertMember(MemberRecord {
            id: MemberId::new(1),
            name: "Alice".to_string(),
            address: address(),
        }))
        .unwrap();
        for (id, name) in [(1, "Widget"), (2, "Gadget")] {
            uow.push(Write::InsertItem(ItemRecord {
                id: ItemId::new(id),
                name: name.to_string(),
                price: Money::from_cents(1000 * id),
                stock_quantity: 100,
            }))
            .unwrap();
        }
        for n in 1..=orders {
            uow.push(Write::InsertDelivery(DeliveryRecord {
                id: DeliveryId::new(n),
                address: address(),
                status: DeliveryStatus::Ready,
            }))
            .unwrap();
            uow.push(Write::InsertOrder(OrderRecord {
                id: OrderId::new(n),
                member_id: MemberId::new(1),
                delivery_id: DeliveryId::new(n),
                order_date: Utc::now(),
                status: OrderStatus::Order,
            }))
            .unwrap();
            for item in 1..=2 {
                uow.push(Write::InsertOrderItem(OrderItemRecord {
                    id: OrderItemId::new(n * 10 + item),
                    order_id: OrderId::new(n),
                    item_id: ItemId::new(item),
                    order_price: Money::from_cents(1000 * item),
                    count: item as u32,
                }))
                .unwrap();
            }
        }
        store.commit(uow).await.unwrap();
        store.clear_query_log();
    }

    #[tokio::test]
    async fn sequences_are_independent_and_increasing() {
        let store = InMemoryOrderStore::new();
        assert_eq!(store.next_id(Sequence::Order).await.unwrap(), 1);
        assert_eq!(store.next_id(Sequence::Order).await.unwrap(), 2);
        assert_eq!(store.next_id(Sequence::Item).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_apply_leaves_tables_untouched() {
        let store = InMemoryOrderStore::new();
        seed(&store, 1).await;

        let result = store
            .apply(vec![
                Write::UpdateOrderStatus {
                    id: OrderId::new(1),
                    expected: OrderStatus::Order,
                    status: OrderStatus::Cancel,
                },
                Write::RemoveItemStock {
                    id: ItemId::new(99),
                    quantity: 1,
                },
            ])
            .await;

        assert!(matches!(result, Err(StoreError::RowNotFound { .. })));
        let order = store.find_order(OrderId::new(1)).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Order);
    }

    #[tokio::test]
    async fn stock_decrement_is_guarded() {
        let store = InMemoryOrderStore::new();
        seed(&store, 1).await;

        let take = |quantity| Write::RemoveItemStock {
            id: ItemId::new(1),
            quantity,
        };
        store.apply(vec![take(60)]).await.unwrap();
        let result = store.apply(vec![take(41)]).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                requested: 41,
                available: 40,
                ..
            })
        ));

        store
            .apply(vec![Write::AddItemStock {
                id: ItemId::new(1),
                quantity: 5,
            }])
            .await
            .unwrap();
        let item = store.find_item(ItemId::new(1)).await.unwrap().unwrap();
        assert_eq!(item.stock_quantity, 45);
    }

    #[tokio::test]
    async fn status_update_from_stale_state_conflicts() {
        let store = InMemoryOrderStore::new();
        seed(&store, 1).await;
        let cancel = || Write::UpdateOrderStatus {
            id: OrderId::new(1),
            expected: OrderStatus::Order,
            status: OrderStatus::Cancel,
        };

        store.apply(vec![cancel()]).await.unwrap();
        let result = store.apply(vec![cancel()]).await;
        assert!(matches!(
            result,
            Err(StoreError::Conflict {
                table: "orders",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn read_only_scope_rejects_writes() {
        let store = InMemoryOrderStore::new();
        seed(&store, 1).await;

        let scope = store.read_only().await.unwrap();
        assert!(scope.is_read_only());
        assert!(!store.is_read_only());
        assert!(matches!(
            scope.next_id(Sequence::Order).await,
            Err(StoreError::ReadOnly)
        ));

        let mut uow = UnitOfWork::read_write();
        uow.push(Write::AddItemStock {
            id: ItemId::new(1),
            quantity: 1,
        })
        .unwrap();
        assert!(matches!(scope.commit(uow).await, Err(StoreError::ReadOnly)));

        let item = scope.find_item(ItemId::new(1)).await.unwrap().unwrap();
        assert_eq!(item.stock_quantity, 100);
        assert_eq!(store.count_of(QueryKind::Apply), 0);
    }

    #[tokio::test]
    async fn read_only_scope_holds_writers_until_dropped() {
        let store = InMemoryOrderStore::new();
        seed(&store, 1).await;
        let scope = store.read_only().await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .apply(vec![Write::UpdateOrderStatus {
                        id: OrderId::new(1),
                        expected: OrderStatus::Order,
                        status: OrderStatus::Cancel,
                    }])
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!writer.is_finished());

        let order = scope.find_order(OrderId::new(1)).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Order);

        drop(scope);
        writer.await.unwrap().unwrap();
        let order = store.find_order(OrderId::new(1)).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancel);
    }

    #[tokio::test]
    async fn dropped_unit_of_work_writes_nothing() {
        let store = InMemoryOrderStore::new();
        {
            let mut uow = UnitOfWork::read_write();
            uow.push(Write::InsertItem(ItemRecord {
                id: ItemId::new(1),
                name: "Widget".to_string(),
                price: Money::from_cents(1000),
                stock_quantity: 10,
            }))
            .unwrap();
        }
        assert!(store.find_item(ItemId::new(1)).await.unwrap().is_none());
        assert_eq!(store.count_of(QueryKind::Apply), 0);
    }

    #[tokio::test]
    async fn full_join_multiplies_rows_per_line() {
        let store = InMemoryOrderStore::new();
        seed(&store, 3).await;

        let rows = store.fetch_orders_with_items().await.unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].graph.order.id, rows[1].graph.order.id);
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn to_one_join_honours_page() {
        let store = InMemoryOrderStore::new();
        seed(&store, 5).await;

        let rows = store
            .fetch_orders_with_member_delivery(Some(Page::new(1, 2)))
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.order.id.as_i64()).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn batch_lookup_rejects_oversized_in_list() {
        let store = InMemoryOrderStore::with_max_batch_size(2);
        seed(&store, 3).await;

        let ids = [OrderId::new(1), OrderId::new(2), OrderId::new(3)];
        let result = store.order_lines_in(&ids).await;
        assert!(matches!(result, Err(StoreError::BatchTooLarge { .. })));

        let lines = store.order_lines_in(&ids[..2]).await.unwrap();
        assert_eq!(lines.len(), 4);
    }

    #[tokio::test]
    async fn search_filters_by_member_name_and_status() {
        let store = InMemoryOrderStore::new();
        seed(&store, 2).await;
        store
            .apply(vec![Write::UpdateOrderStatus {
                id: OrderId::new(2),
                expected: OrderStatus::Order,
                status: OrderStatus::Cancel,
            }])
            .await
            .unwrap();

        let all = store.search_orders(&OrderFilter::new()).await.unwrap();
        assert_eq!(all.len(), 2);

        let cancelled = store
            .search_orders(&OrderFilter::new().member_name("Ali").status(OrderStatus::Cancel))
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, OrderId::new(2));

        let nobody = store
            .search_orders(&OrderFilter::new().member_name("Bob"))
            .await
            .unwrap();
        assert!(nobody.is_empty());
    }

    #[tokio::test]
    async fn flat_rows_repeat_root_columns() {
        let store = InMemoryOrderStore::new();
        seed(&store, 2).await;

        let rows = store.order_flat_rows().await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].member_name, "Alice");
        assert_eq!(rows[0].item_name, "Widget");
        assert_eq!(rows[1].item_name, "Gadget");
        assert_eq!(rows[2].order_id, OrderId::new(2));
    }
}
