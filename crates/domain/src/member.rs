use common::{Address, MemberId};
use order_store::{MemberRecord, OrderStore, Sequence, UnitOfWork, Write};

use crate::{DomainError, Result};

/// A customer who places orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    id: MemberId,
    name: String,
    address: Address,
}

impl Member {
    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default delivery address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub(crate) fn from_record(record: MemberRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            address: record.address,
        }
    }
}

/// Key/value access to members.
#[derive(Clone)]
pub struct MemberRepository<S> {
    store: S,
}

impl<S: OrderStore> MemberRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a new member in the unit of work.
    pub async fn register(
        &self,
        uow: &mut UnitOfWork,
        name: impl Into<String>,
        address: Address,
    ) -> Result<Member> {
        let id = MemberId::new(self.store.next_id(Sequence::Member).await?);
        let member = Member {
            id,
            name: name.into(),
            address,
        };
        uow.push(Write::InsertMember(MemberRecord {
            id,
            name: member.name.clone(),
            address: member.address.clone(),
        }))?;
        Ok(member)
    }

    pub async fn find(&self, id: MemberId) -> Result<Option<Member>> {
        Ok(self.store.find_member(id).await?.map(Member::from_record))
    }

    /// Finds a member, failing with `NotFound` if it does not exist.
    pub async fn find_one(&self, id: MemberId) -> Result<Member> {
        self.find(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Member", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_store::{InMemoryOrderStore, OrderStoreExt, StoreError};

    #[tokio::test]
    async fn register_requires_read_write() {
        let repo = MemberRepository::new(InMemoryOrderStore::new());
        let mut uow = UnitOfWork::read_only();
        let err = repo
            .register(&mut uow, "Alice", Address::new("Seoul", "1 Main St", "00001"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Store(StoreError::ReadOnly)));
    }

    #[tokio::test]
    async fn registered_member_is_found_after_commit() {
        let store = InMemoryOrderStore::new();
        let repo = MemberRepository::new(store.clone());

        let mut uow = UnitOfWork::read_write();
        let member = repo
            .register(&mut uow, "Alice", Address::new("Seoul", "1 Main St", "00001"))
            .await
            .unwrap();
        assert!(repo.find(member.id()).await.unwrap().is_none());

        store.commit(uow).await.unwrap();
        let found = repo.find_one(member.id()).await.unwrap();
        assert_eq!(found.name(), "Alice");
        assert_eq!(found.address().city(), "Seoul");
    }
}
