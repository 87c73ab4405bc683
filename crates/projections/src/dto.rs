//! DTO shapes selected directly from the store.

use chrono::{DateTime, Utc};
use common::{Address, Money, OrderId, OrderStatus};
use order_store::{OrderFlatRow, OrderLineRow, OrderSummaryRow};
use serde::Serialize;

/// An order with its lines, built from column projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderQueryDto {
    pub order_id: OrderId,
    pub name: String,
    pub order_date: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub address: Address,
    pub order_items: Vec<OrderItemQueryDto>,
}

/// One line of an [`OrderQueryDto`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemQueryDto {
    #[serde(skip)]
    pub order_id: OrderId,
    pub item_name: String,
    pub order_price: Money,
    pub count: u32,
}

/// One row per (order, line) of the flat join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderFlatDto {
    pub order_id: OrderId,
    pub name: String,
    pub order_date: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub address: Address,
    pub item_name: String,
    pub order_price: Money,
    pub count: u32,
}

/// Root columns only; to-one data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSimpleQueryDto {
    pub order_id: OrderId,
    pub name: String,
    pub order_date: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub address: Address,
}

impl OrderQueryDto {
    pub(crate) fn from_summary(row: OrderSummaryRow) -> Self {
        Self {
            order_id: row.order_id,
            name: row.member_name,
            order_date: row.order_date,
            order_status: row.status,
            address: row.address,
            order_items: Vec::new(),
        }
    }
}

impl From<OrderLineRow> for OrderItemQueryDto {
    fn from(row: OrderLineRow) -> Self {
        Self {
            order_id: row.order_id,
            item_name: row.item_name,
            order_price: row.order_price,
            count: row.count,
        }
    }
}

impl From<OrderFlatRow> for OrderFlatDto {
    fn from(row: OrderFlatRow) -> Self {
        Self {
            order_id: row.order_id,
            name: row.member_name,
            order_date: row.order_date,
            order_status: row.status,
            address: row.address,
            item_name: row.item_name,
            order_price: row.order_price,
            count: row.count,
        }
    }
}

impl From<OrderSummaryRow> for OrderSimpleQueryDto {
    fn from(row: OrderSummaryRow) -> Self {
        Self {
            order_id: row.order_id,
            name: row.member_name,
            order_date: row.order_date,
            order_status: row.status,
            address: row.address,
        }
    }
}
