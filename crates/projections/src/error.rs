//! Query error types.

use domain::DomainError;
use order_store::StoreError;
use thiserror::Error;

/// Errors that can occur while building order listings.
#[derive(Debug, Error)]
pub enum QueryError {
    /// An error occurred in the order store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An aggregate could not be turned into a listing entry.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
