use chrono::{DateTime, Utc};
use common::{Address, OrderId, OrderStatus};
use domain::Order;
use serde::Serialize;

use super::saved_id;
use crate::Result;

/// Root and to-one data of a loaded aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimpleOrderDto {
    pub order_id: OrderId,
    pub name: String,
    pub order_date: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub address: Address,
}

impl SimpleOrderDto {
    /// Reads member and delivery; both must already be loaded.
    pub fn from_order(order: &Order) -> Result<Self> {
        Ok(Self {
            order_id: saved_id(order)?,
            name: order.member()?.name().to_string(),
            order_date: order.order_date(),
            order_status: order.status(),
            address: order.delivery()?.address().clone(),
        })
    }
}
