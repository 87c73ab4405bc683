use chrono::{DateTime, Utc};
use common::{Address, Money, OrderId, OrderStatus};
use domain::{Order, OrderItem};
use serde::Serialize;

use super::saved_id;
use crate::Result;

/// An order with its lines, read from a loaded aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDto {
    pub order_id: OrderId,
    pub name: String,
    pub order_date: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub address: Address,
    pub order_items: Vec<OrderItemDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemDto {
    pub item_name: String,
    pub order_price: Money,
    pub count: u32,
}

impl OrderDto {
    /// Reads member, delivery, lines and items; each must already be loaded.
    pub fn from_order(order: &Order) -> Result<Self> {
        let order_items = order
            .order_items()?
            .iter()
            .map(OrderItemDto::from_order_item)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            order_id: saved_id(order)?,
            name: order.member()?.name().to_string(),
            order_date: order.order_date(),
            order_status: order.status(),
            address: order.delivery()?.address().clone(),
            order_items,
        })
    }
}

impl OrderItemDto {
    pub fn from_order_item(line: &OrderItem) -> Result<Self> {
        Ok(Self {
            item_name: line.item()?.name().to_string(),
            order_price: line.order_price(),
            count: line.count(),
        })
    }
}
