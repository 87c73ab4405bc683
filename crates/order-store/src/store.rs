use async_trait::async_trait;
use common::{DeliveryId, ItemId, MemberId, OrderId};

use crate::query::{OrderFilter, Page, Sequence};
use crate::record::{
    DeliveryRecord, ItemRecord, MemberRecord, OrderFetchRow, OrderFlatRow, OrderGraphRow,
    OrderItemRecord, OrderItemRow, OrderLineRow, OrderRecord, OrderSummaryRow,
};
use crate::unit_of_work::{UnitOfWork, Write};
use crate::{Result, StoreError};

/// The kind of round-trip a store call performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    NextId,
    Apply,
    FindMember,
    FindItem,
    FindItems,
    FindOrder,
    FindDelivery,
    FindOrderItems,
    SearchOrders,
    FetchOrdersWithMemberDelivery,
    FetchOrdersWithItems,
    FetchOrderItemsIn,
    OrderSummaries,
    OrderLines,
    OrderLinesIn,
    OrderFlatRows,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::NextId => "next_id",
            QueryKind::Apply => "apply",
            QueryKind::FindMember => "find_member",
            QueryKind::FindItem => "find_item",
            QueryKind::FindItems => "find_items",
            QueryKind::FindOrder => "find_order",
            QueryKind::FindDelivery => "find_delivery",
            QueryKind::FindOrderItems => "find_order_items",
            QueryKind::SearchOrders => "search_orders",
            QueryKind::FetchOrdersWithMemberDelivery => "fetch_orders_with_member_delivery",
            QueryKind::FetchOrdersWithItems => "fetch_orders_with_items",
            QueryKind::FetchOrderItemsIn => "fetch_order_items_in",
            QueryKind::OrderSummaries => "order_summaries",
            QueryKind::OrderLines => "order_lines",
            QueryKind::OrderLinesIn => "order_lines_in",
            QueryKind::OrderFlatRows => "order_flat_rows",
        }
    }

    /// Records the round-trip in the metrics registry and the debug log.
    pub(crate) fn record(self) {
        metrics::counter!("order_store_queries_total", "kind" => self.as_str()).increment(1);
        tracing::debug!(kind = self.as_str(), "store round-trip");
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core trait for order datastore implementations.
///
/// Each method is exactly one round-trip. Result ordering is deterministic:
/// roots by order id, lines by order-item id.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Allocates the next identifier from a sequence.
    async fn next_id(&self, sequence: Sequence) -> Result<i64>;

    /// Applies writes atomically, in order. Either all succeed or none do.
    ///
    /// Stock and status writes are guarded against the row's current value,
    /// so a write computed from a stale read fails instead of overwriting.
    async fn apply(&self, writes: Vec<Write>) -> Result<()>;

    /// Opens a read-only scope over the store.
    ///
    /// Every read through the returned handle sees one consistent view of the
    /// data. `next_id` and `apply` on it fail with [`StoreError::ReadOnly`].
    /// The scope ends when the last clone of the handle is dropped.
    async fn read_only(&self) -> Result<Self>
    where
        Self: Sized;

    /// Whether this handle is a read-only scope.
    fn is_read_only(&self) -> bool;

    /// Largest key list accepted by the multi-key lookups.
    fn max_batch_size(&self) -> usize;

    async fn find_member(&self, id: MemberId) -> Result<Option<MemberRecord>>;

    async fn find_item(&self, id: ItemId) -> Result<Option<ItemRecord>>;

    /// Multi-key item lookup.
    async fn find_items(&self, ids: &[ItemId]) -> Result<Vec<ItemRecord>>;

    async fn find_order(&self, id: OrderId) -> Result<Option<OrderRecord>>;

    async fn find_delivery(&self, id: DeliveryId) -> Result<Option<DeliveryRecord>>;

    /// Lines of a single order, without their items.
    async fn find_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>>;

    /// Roots matching the filter. Relations are not joined into the result.
    async fn search_orders(&self, filter: &OrderFilter) -> Result<Vec<OrderRecord>>;

    /// Orders joined with member and delivery, optionally windowed.
    ///
    /// Windowing is sound here because to-one joins do not multiply rows.
    async fn fetch_orders_with_member_delivery(
        &self,
        page: Option<Page>,
    ) -> Result<Vec<OrderGraphRow>>;

    /// Orders joined with member, delivery, lines and items.
    ///
    /// Yields one row per line; never windowed.
    async fn fetch_orders_with_items(&self) -> Result<Vec<OrderFetchRow>>;

    /// Lines with their items for many orders at once.
    async fn fetch_order_items_in(&self, order_ids: &[OrderId]) -> Result<Vec<OrderItemRow>>;

    /// Root columns for every order.
    async fn order_summaries(&self) -> Result<Vec<OrderSummaryRow>>;

    /// Line columns for a single order.
    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLineRow>>;

    /// Line columns for many orders at once.
    async fn order_lines_in(&self, order_ids: &[OrderId]) -> Result<Vec<OrderLineRow>>;

    /// Root and line columns joined, one row per line.
    async fn order_flat_rows(&self) -> Result<Vec<OrderFlatRow>>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Commits a unit of work, applying its buffered writes atomically.
    async fn commit(&self, uow: UnitOfWork) -> Result<()> {
        let writes = uow.take_writes();
        if writes.is_empty() {
            return Ok(());
        }
        let count = writes.len();
        self.apply(writes).await?;
        tracing::debug!(writes = count, "unit of work committed");
        Ok(())
    }

    /// Allocates the next identifier and wraps it in a typed id.
    async fn allocate<T: From<i64> + Send>(&self, sequence: Sequence) -> Result<T> {
        Ok(T::from(self.next_id(sequence).await?))
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}

/// Rejects a multi-key lookup larger than the store accepts.
pub fn check_batch_size(requested: usize, max: usize) -> Result<()> {
    if requested > max {
        return Err(StoreError::BatchTooLarge { requested, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_within_limit_is_accepted() {
        assert!(check_batch_size(10, 10).is_ok());
        assert!(check_batch_size(0, 10).is_ok());
    }

    #[test]
    fn batch_over_limit_is_rejected() {
        let err = check_batch_size(11, 10).unwrap_err();
        assert!(matches!(
            err,
            StoreError::BatchTooLarge {
                requested: 11,
                max: 10
            }
        ));
    }

    #[test]
    fn query_kind_names_are_snake_case() {
        assert_eq!(QueryKind::OrderLinesIn.to_string(), "order_lines_in");
        assert_eq!(
            QueryKind::FetchOrdersWithMemberDelivery.as_str(),
            "fetch_orders_with_member_delivery"
        );
    }
}
