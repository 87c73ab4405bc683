use common::{ItemId, Money, OrderItemId};
use order_store::{ItemRecord, OrderItemRecord};

use super::OrderError;
use crate::relation::Relation;
use crate::{Item, Result};

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    id: Option<OrderItemId>,
    item: Relation<ItemId, Item>,
    order_price: Money,
    count: u32,
}

impl OrderItem {
    /// Creates a line for `count` units of `item`, taking them out of stock.
    ///
    /// `order_price` is the unit price captured at order time.
    pub fn create(item: &mut Item, order_price: Money, count: u32) -> Result<OrderItem> {
        if count == 0 {
            return Err(OrderError::InvalidCount { count }.into());
        }
        if order_price.checked_multiply(count).is_none() {
            return Err(OrderError::AmountOverflow("line total").into());
        }
        item.remove_stock(count)?;

        Ok(OrderItem {
            id: None,
            item: Relation::Loaded(item.clone()),
            order_price,
            count,
        })
    }

    pub fn id(&self) -> Option<OrderItemId> {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        match &self.item {
            Relation::Unloaded(id) => *id,
            Relation::Loaded(item) => item.id(),
        }
    }

    /// The referenced item, if loaded.
    pub fn item(&self) -> Result<&Item> {
        self.item.get("item")
    }

    pub fn is_item_loaded(&self) -> bool {
        self.item.is_loaded()
    }

    pub fn order_price(&self) -> Money {
        self.order_price
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Unit price times count.
    pub fn total_price(&self) -> Result<Money> {
        self.order_price
            .checked_multiply(self.count)
            .ok_or_else(|| OrderError::AmountOverflow("line total").into())
    }

    pub(crate) fn load_item(&mut self, item: Item) {
        self.item.load(item);
    }

    pub(crate) fn assign_id(&mut self, id: OrderItemId) {
        self.id = Some(id);
    }

    pub(crate) fn from_record(record: OrderItemRecord) -> Self {
        Self {
            id: Some(record.id),
            item: Relation::Unloaded(record.item_id),
            order_price: record.order_price,
            count: record.count,
        }
    }

    pub(crate) fn from_rows(record: OrderItemRecord, item: ItemRecord) -> Self {
        let mut line = Self::from_record(record);
        line.load_item(Item::from_record(item));
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DomainError;

    fn widget(stock: u32) -> Item {
        Item::from_record(ItemRecord {
            id: ItemId::new(1),
            name: "Widget".to_string(),
            price: Money::from_cents(1000),
            stock_quantity: stock,
        })
    }

    #[test]
    fn create_takes_stock() {
        let mut item = widget(10);
        let price = item.price();
        let line = OrderItem::create(&mut item, price, 3).unwrap();

        assert_eq!(item.stock_quantity(), 7);
        assert_eq!(line.count(), 3);
        assert_eq!(line.total_price().unwrap(), Money::from_cents(3000));
        assert_eq!(line.item_id(), ItemId::new(1));
    }

    #[test]
    fn create_with_zero_count_is_rejected() {
        let mut item = widget(10);
        let price = item.price();
        let err = OrderItem::create(&mut item, price, 0).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
        assert_eq!(item.stock_quantity(), 10);
    }

    #[test]
    fn create_with_overflowing_total_is_rejected() {
        let mut item = widget(10);
        let err = OrderItem::create(&mut item, Money::from_cents(i64::MAX / 2), 3).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
        assert_eq!(item.stock_quantity(), 10);
    }

    #[test]
    fn create_beyond_stock_fails() {
        let mut item = widget(2);
        let price = item.price();
        let err = OrderItem::create(&mut item, price, 3).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(item.stock_quantity(), 2);
    }
}
