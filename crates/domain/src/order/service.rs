//! Order service: each operation runs in its own unit of work.

use common::{DeliveryStatus, ItemId, MemberId, OrderId, OrderStatus};
use order_store::{OrderStore, OrderStoreExt, UnitOfWork};

use super::{Delivery, FetchConfig, Order, OrderItem, OrderRepository, OrderSearch};
use crate::{DomainError, ItemRepository, MemberRepository, ReadScope, Result};

/// Service for placing, cancelling and listing orders.
///
/// A failed operation drops its unit of work, so nothing it buffered reaches
/// the store. Commands read outside any scope and rely on guarded writes:
/// stock moves relative to the committed level and status changes only
/// apply from the status that was read. Lookups run in a [`ReadScope`].
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    orders: OrderRepository<S>,
    members: MemberRepository<S>,
    items: ItemRepository<S>,
}

impl<S: OrderStore + Clone> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S, config: FetchConfig) -> Self {
        Self {
            orders: OrderRepository::new(store.clone(), config),
            members: MemberRepository::new(store.clone()),
            items: ItemRepository::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn orders(&self) -> &OrderRepository<S> {
        &self.orders
    }

    pub fn members(&self) -> &MemberRepository<S> {
        &self.members
    }

    pub fn items(&self) -> &ItemRepository<S> {
        &self.items
    }

    /// Opens a read-only scope for lookups and listings.
    pub async fn read_scope(&self) -> Result<ReadScope<S>> {
        ReadScope::open(&self.store, self.orders.config()).await
    }

    /// Places an order for `count` units of one item, delivered to the
    /// member's address at the item's current price.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(
        &self,
        member_id: MemberId,
        item_id: ItemId,
        count: u32,
    ) -> Result<OrderId> {
        let mut uow = UnitOfWork::read_write();

        let member = self.members.find_one(member_id).await?;
        let mut item = self.items.find_one(item_id).await?;

        let delivery = Delivery::new(member.address().clone());
        let price = item.price();
        let order_item = OrderItem::create(&mut item, price, count)?;
        let mut order = Order::create(member, delivery, vec![order_item])?;

        let order_id = self.orders.save(&mut uow, &mut order).await?;
        self.items.remove_stock(&mut uow, item_id, count)?;
        self.store.commit(uow).await?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(%order_id, "order placed");
        Ok(order_id)
    }

    /// Cancels an order and restores the stock of every item it references.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<()> {
        let mut uow = UnitOfWork::read_write();

        let mut order = find_loaded(&self.orders, order_id).await?;
        let mut items = order.referenced_items()?;
        order.cancel(&mut items)?;

        self.orders.update_status(&mut uow, &order, OrderStatus::Order)?;
        // a concurrent ship must not slip in between the check and the commit
        self.orders.update_delivery_status(&mut uow, &order, DeliveryStatus::Ready)?;
        for line in order.order_items()? {
            self.items.add_stock(&mut uow, line.item_id(), line.count())?;
        }
        self.store.commit(uow).await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, "order cancelled");
        Ok(())
    }

    /// Marks the order's delivery as shipped, after which it can no longer be
    /// cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn ship_order(&self, order_id: OrderId) -> Result<()> {
        let mut uow = UnitOfWork::read_write();

        let mut order = self
            .orders
            .find_one(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;
        self.orders.load_delivery(&mut order).await?;
        order.ship()?;

        // the order must still be open at commit
        self.orders.update_status(&mut uow, &order, OrderStatus::Order)?;
        self.orders.update_delivery_status(&mut uow, &order, DeliveryStatus::Ready)?;
        self.store.commit(uow).await?;

        tracing::info!(%order_id, "order shipped");
        Ok(())
    }

    /// Searches orders in a read-only scope. Relations are left unloaded.
    #[tracing::instrument(skip(self))]
    pub async fn find_orders(&self, search: &OrderSearch) -> Result<Vec<Order>> {
        let scope = self.read_scope().await?;
        scope.orders().find_all(search).await
    }

    /// Searches orders and initializes every relation, all in one read-only
    /// scope.
    #[tracing::instrument(skip(self))]
    pub async fn find_orders_with_graph(&self, search: &OrderSearch) -> Result<Vec<Order>> {
        let scope = self.read_scope().await?;
        let mut orders = scope.orders().find_all(search).await?;
        scope.orders().initialize_graph(&mut orders).await?;
        Ok(orders)
    }

    /// Loads one order with every relation initialized, in a read-only scope.
    #[tracing::instrument(skip(self))]
    pub async fn find_order(&self, order_id: OrderId) -> Result<Order> {
        let scope = self.read_scope().await?;
        find_loaded(scope.orders(), order_id).await
    }
}

async fn find_loaded<S: OrderStore + Clone>(
    orders: &OrderRepository<S>,
    order_id: OrderId,
) -> Result<Order> {
    orders
        .find_one_with_graph(order_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Order", order_id))
}
