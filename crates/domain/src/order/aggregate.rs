//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{DeliveryId, DeliveryStatus, MemberId, Money, OrderId, OrderStatus};
use order_store::{OrderGraphRow, OrderRecord};

use super::{Delivery, OrderError, OrderItem};
use crate::relation::{Collection, Relation};
use crate::{ItemSet, Member, Result};

/// Order aggregate root.
///
/// Owns its delivery and order lines; references its member. Relations loaded
/// from the store start unloaded unless the retrieval strategy joined them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Assigned by the repository on save.
    id: Option<OrderId>,

    member: Relation<MemberId, Member>,

    delivery: Relation<DeliveryId, Delivery>,

    order_items: Collection<OrderItem>,

    /// Set at creation and never changed.
    order_date: DateTime<Utc>,

    status: OrderStatus,
}

// Query methods
impl Order {
    pub fn id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn member_id(&self) -> MemberId {
        match &self.member {
            Relation::Unloaded(id) => *id,
            Relation::Loaded(member) => member.id(),
        }
    }

    pub fn member(&self) -> Result<&Member> {
        self.member.get("member")
    }

    pub fn delivery_id(&self) -> Option<DeliveryId> {
        match &self.delivery {
            Relation::Unloaded(id) => Some(*id),
            Relation::Loaded(delivery) => delivery.id(),
        }
    }

    pub fn delivery(&self) -> Result<&Delivery> {
        self.delivery.get("delivery")
    }

    pub fn order_items(&self) -> Result<&[OrderItem]> {
        self.order_items.get("order_items")
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_member_loaded(&self) -> bool {
        self.member.is_loaded()
    }

    pub fn is_delivery_loaded(&self) -> bool {
        self.delivery.is_loaded()
    }

    pub fn are_order_items_loaded(&self) -> bool {
        self.order_items.is_loaded()
    }

    /// Sum of price times count over every line, recomputed on each call.
    ///
    /// Fails with `InvalidArgument` if the total does not fit in an amount.
    pub fn total_price(&self) -> Result<Money> {
        let totals = self
            .order_items()?
            .iter()
            .map(OrderItem::total_price)
            .collect::<Result<Vec<_>>>()?;
        Money::checked_sum(totals).ok_or_else(|| OrderError::AmountOverflow("order total").into())
    }

    /// Clones the items referenced by the lines, one entry per item.
    pub fn referenced_items(&self) -> Result<ItemSet> {
        let mut items = ItemSet::new();
        for line in self.order_items()? {
            let item = line.item()?;
            items.entry(item.id()).or_insert_with(|| item.clone());
        }
        Ok(items)
    }
}

// Command methods
impl Order {
    /// Creates a new order dated now.
    ///
    /// Stock has already been taken by [`OrderItem::create`].
    pub fn create(member: Member, delivery: Delivery, order_items: Vec<OrderItem>) -> Result<Order> {
        if order_items.is_empty() {
            return Err(OrderError::NoItems.into());
        }

        Ok(Order {
            id: None,
            member: Relation::Loaded(member),
            delivery: Relation::Loaded(delivery),
            order_items: Collection::Loaded(order_items),
            order_date: Utc::now(),
            status: OrderStatus::Order,
        })
    }

    /// Cancels the order and returns each line's count to its item.
    ///
    /// Every check runs before anything is mutated, so on error neither the
    /// order nor `items` has changed.
    pub fn cancel(&mut self, items: &mut ItemSet) -> Result<()> {
        if self.status == OrderStatus::Cancel {
            return Err(OrderError::AlreadyCancelled.into());
        }
        if self.delivery()?.status() == DeliveryStatus::Shipped {
            return Err(OrderError::AlreadyShipped.into());
        }

        let lines = self.order_items.get("order_items")?;
        if let Some(line) = lines.iter().find(|l| !items.contains_key(&l.item_id())) {
            return Err(OrderError::MissingItem(line.item_id()).into());
        }

        for line in lines {
            if let Some(item) = items.get_mut(&line.item_id()) {
                item.add_stock(line.count());
            }
        }
        self.status = OrderStatus::Cancel;
        Ok(())
    }

    /// Ships the order's delivery.
    pub fn ship(&mut self) -> Result<()> {
        if self.status == OrderStatus::Cancel {
            return Err(OrderError::AlreadyCancelled.into());
        }
        self.delivery.get_mut("delivery")?.ship()?;
        Ok(())
    }
}

// Repository hooks
impl Order {
    pub(crate) fn from_record(record: OrderRecord) -> Self {
        Order {
            id: Some(record.id),
            member: Relation::Unloaded(record.member_id),
            delivery: Relation::Unloaded(record.delivery_id),
            order_items: Collection::Unloaded,
            order_date: record.order_date,
            status: record.status,
        }
    }

    /// Builds an order whose to-one relations are loaded from a joined row.
    pub(crate) fn from_graph(row: OrderGraphRow) -> Self {
        let mut order = Self::from_record(row.order);
        order.load_member(Member::from_record(row.member));
        order.load_delivery(Delivery::from_record(row.delivery));
        order
    }

    pub(crate) fn load_member(&mut self, member: Member) {
        self.member.load(member);
    }

    pub(crate) fn load_delivery(&mut self, delivery: Delivery) {
        self.delivery.load(delivery);
    }

    pub(crate) fn load_order_items(&mut self, order_items: Vec<OrderItem>) {
        self.order_items.load(order_items);
    }

    pub(crate) fn order_items_mut(&mut self) -> Result<&mut Vec<OrderItem>> {
        self.order_items.get_mut("order_items")
    }

    pub(crate) fn delivery_mut(&mut self) -> Result<&mut Delivery> {
        self.delivery.get_mut("delivery")
    }

    pub(crate) fn assign_id(&mut self, id: OrderId) {
        self.id = Some(id);
    }
}
