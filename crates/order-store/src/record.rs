//! Row shapes returned by the store.
//!
//! Plain records mirror one table each. Joined rows bundle the records a single
//! query returns together, and projection rows carry only the selected columns.

use chrono::{DateTime, Utc};
use common::{
    Address, DeliveryId, DeliveryStatus, ItemId, MemberId, Money, OrderId, OrderItemId,
    OrderStatus,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: MemberId,
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub name: String,
    pub price: Money,
    pub stock_quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: DeliveryId,
    pub address: Address,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub member_id: MemberId,
    pub delivery_id: DeliveryId,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub item_id: ItemId,
    /// Unit price captured when the order was placed.
    pub order_price: Money,
    pub count: u32,
}

/// An order joined with its to-one relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderGraphRow {
    pub order: OrderRecord,
    pub member: MemberRecord,
    pub delivery: DeliveryRecord,
}

/// An order line joined with the item it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemRow {
    pub order_item: OrderItemRecord,
    pub item: ItemRecord,
}

/// One row of the full join across the order-items edge.
///
/// The to-one part repeats once per line of the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFetchRow {
    pub graph: OrderGraphRow,
    pub line: OrderItemRow,
}

/// Root columns of an order listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummaryRow {
    pub order_id: OrderId,
    pub member_name: String,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub address: Address,
}

/// Line columns of an order listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineRow {
    pub order_id: OrderId,
    pub item_name: String,
    pub order_price: Money,
    pub count: u32,
}

/// Root and line columns flattened into one row per (order, line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFlatRow {
    pub order_id: OrderId,
    pub member_name: String,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub address: Address,
    pub item_name: String,
    pub order_price: Money,
    pub count: u32,
}
