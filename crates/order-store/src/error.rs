use common::ItemId;
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write was issued through a read-only unit of work.
    #[error("Write attempted in a read-only transaction")]
    ReadOnly,

    /// A multi-key lookup exceeded the store's IN-list limit.
    #[error("Batch of {requested} keys exceeds the maximum of {max}")]
    BatchTooLarge { requested: usize, max: usize },

    /// An update targeted a row that does not exist.
    #[error("No {table} row with id {id}")]
    RowNotFound { table: &'static str, id: i64 },

    /// A guarded stock decrement found fewer units than it takes.
    #[error("Insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: u32,
        available: u32,
    },

    /// A guarded status update found the row in another state.
    #[error("Conflicting update of {table} row {id}: expected {expected}, found {found}")]
    Conflict {
        table: &'static str,
        id: i64,
        expected: &'static str,
        found: String,
    },

    /// A stored value could not be decoded into a record.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
