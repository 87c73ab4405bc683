//! Read-only scope over the order store.

use order_store::OrderStore;

use crate::{FetchConfig, ItemRepository, MemberRepository, OrderRepository, Result};

/// Repositories bound to one read-only scope of the store.
///
/// Every read sees the same view of the data. Id allocation and commits
/// through [`store`](Self::store) fail with `StoreError::ReadOnly`. Drop the
/// scope before committing elsewhere: the in-memory store holds writers back
/// while a scope is open.
#[derive(Clone)]
pub struct ReadScope<S> {
    store: S,
    orders: OrderRepository<S>,
    members: MemberRepository<S>,
    items: ItemRepository<S>,
}

impl<S: OrderStore + Clone> ReadScope<S> {
    /// Opens a read-only scope over `store`.
    pub async fn open(store: &S, config: FetchConfig) -> Result<Self> {
        let store = store.read_only().await?;
        Ok(Self {
            orders: OrderRepository::new(store.clone(), config),
            members: MemberRepository::new(store.clone()),
            items: ItemRepository::new(store.clone()),
            store,
        })
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
}
