//! Items and their stock.

use std::collections::BTreeMap;

use common::{ItemId, Money};
use order_store::{ItemRecord, OrderStore, Sequence, UnitOfWork, Write};

use crate::{DomainError, Result};

/// A sellable item with a stock level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    name: String,
    price: Money,
    stock_quantity: u32,
}

/// Items keyed by id, as handed to [`Order::cancel`](crate::Order::cancel).
///
/// One entry per item, even when several order lines reference it.
pub type ItemSet = BTreeMap<ItemId, Item>;

impl Item {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock_quantity(&self) -> u32 {
        self.stock_quantity
    }

    /// Adds stock back.
    pub fn add_stock(&mut self, quantity: u32) {
        self.stock_quantity = self.stock_quantity.saturating_add(quantity);
    }

    /// Removes stock, failing without change if there is not enough.
    pub fn remove_stock(&mut self, quantity: u32) -> Result<()> {
        if quantity > self.stock_quantity {
            return Err(DomainError::InsufficientStock {
                item_id: self.id,
                requested: quantity,
                available: self.stock_quantity,
            });
        }
        self.stock_quantity -= quantity;
        Ok(())
    }

    pub(crate) fn from_record(record: ItemRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            price: record.price,
            stock_quantity: record.stock_quantity,
        }
    }

    fn to_record(&self) -> ItemRecord {
        ItemRecord {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            stock_quantity: self.stock_quantity,
        }
    }
}

/// Key/value access to items.
#[derive(Clone)]
pub struct ItemRepository<S> {
    store: S,
}

impl<S: OrderStore> ItemRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a new item in the unit of work.
    pub async fn register(
        &self,
        uow: &mut UnitOfWork,
        name: impl Into<String>,
        price: Money,
        stock_quantity: u32,
    ) -> Result<Item> {
        let id = ItemId::new(self.store.next_id(Sequence::Item).await?);
        let item = Item {
            id,
            name: name.into(),
            price,
            stock_quantity,
        };
        uow.push(Write::InsertItem(item.to_record()))?;
        Ok(item)
    }

    pub async fn find(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.store.find_item(id).await?.map(Item::from_record))
    }

    /// Finds an item, failing with `NotFound` if it does not exist.
    pub async fn find_one(&self, id: ItemId) -> Result<Item> {
        self.find(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Item", id))
    }

    /// Loads many items, one round-trip per `chunk_size` ids.
    pub async fn find_many(&self, ids: &[ItemId], chunk_size: usize) -> Result<ItemSet> {
        let chunk_size = chunk_size.clamp(1, self.store.max_batch_size().max(1));
        let mut items = ItemSet::new();
        for chunk in ids.chunks(chunk_size) {
            for record in self.store.find_items(chunk).await? {
                items.insert(record.id, Item::from_record(record));
            }
        }
        Ok(items)
    }

    /// Buffers taking `quantity` units out of stock.
    ///
    /// The store applies it against the stock at commit time and fails with
    /// `InsufficientStock` if a concurrent order got there first.
    pub fn remove_stock(&self, uow: &mut UnitOfWork, id: ItemId, quantity: u32) -> Result<()> {
        uow.push(Write::RemoveItemStock { id, quantity })?;
        Ok(())
    }

    /// Buffers putting `quantity` units back into stock.
    pub fn add_stock(&self, uow: &mut UnitOfWork, id: ItemId, quantity: u32) -> Result<()> {
        uow.push(Write::AddItemStock { id, quantity })?;
        Ok(())
    }
}
