//! Shared identifiers and value types used by every layer of the order core.

pub mod status;
pub mod types;
pub mod value_objects;

pub use status::{DeliveryStatus, OrderStatus, UnknownStatus};
pub use types::{DeliveryId, ItemId, MemberId, OrderId, OrderItemId};
pub use value_objects::{Address, Money};
