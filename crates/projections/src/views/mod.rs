//! Listing shapes built from loaded aggregates.

pub mod order_dto;
pub mod simple_order_dto;

pub use order_dto::{OrderDto, OrderItemDto};
pub use simple_order_dto::SimpleOrderDto;

use common::OrderId;
use domain::{DomainError, Order};

fn saved_id(order: &Order) -> Result<OrderId, DomainError> {
    order
        .id()
        .ok_or_else(|| DomainError::IllegalState("order has not been saved".to_string()))
}
