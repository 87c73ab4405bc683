//! Domain error types.

use common::ItemId;
use order_store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// An item does not have enough stock for the requested count.
    #[error("Insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: u32,
        available: u32,
    },

    /// The operation is not allowed in the entity's current state.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A caller-supplied argument was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A relation was read before it was loaded.
    #[error("Relation not loaded: {0}")]
    NotLoaded(&'static str),

    /// An error occurred in the order store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DomainError {
    /// Guarded writes that lost a race surface as the rule they protect.
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InsufficientStock {
                item_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                item_id,
                requested,
                available,
            },
            StoreError::Conflict { .. } => DomainError::IllegalState(e.to_string()),
            e => DomainError::Store(e),
        }
    }
}

impl DomainError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        DomainError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
