//! Order aggregate and related types.

mod aggregate;
mod delivery;
mod order_item;
mod repository;
mod search;
mod service;

pub use aggregate::Order;
pub use delivery::Delivery;
pub use order_item::OrderItem;
pub use repository::{FetchConfig, OrderRepository};
pub use search::OrderSearch;
pub use service::OrderService;

use common::ItemId;
use thiserror::Error;

use crate::DomainError;

/// Rule violations raised by the order aggregate.
#[derive(Debug, Error)]
pub enum OrderError {
    /// An order must have at least one line.
    #[error("An order needs at least one order item")]
    NoItems,

    /// Order line count must be positive.
    #[error("Invalid count: {count} (must be greater than 0)")]
    InvalidCount { count: u32 },

    /// The order has already been cancelled.
    #[error("Order is already cancelled")]
    AlreadyCancelled,

    /// The delivery has left the warehouse.
    #[error("Delivery has already shipped")]
    AlreadyShipped,

    /// An order already has an identity and cannot be saved again.
    #[error("Order is already saved")]
    AlreadySaved,

    /// A price times count, or a sum of line totals, does not fit in an amount.
    #[error("Amount overflow: {0}")]
    AmountOverflow(&'static str),

    /// An order line references an item missing from the supplied set.
    #[error("Item {0} is not part of the supplied item set")]
    MissingItem(ItemId),
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NoItems
            | OrderError::InvalidCount { .. }
            | OrderError::AmountOverflow(_) => DomainError::InvalidArgument(e.to_string()),
            OrderError::AlreadyCancelled | OrderError::AlreadyShipped | OrderError::AlreadySaved => {
                DomainError::IllegalState(e.to_string())
            }
            OrderError::MissingItem(id) => DomainError::not_found("Item", id),
        }
    }
}
