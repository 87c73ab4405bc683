//! Order and delivery status enums.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A status column held a value no enum variant matches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status: {0}")]
pub struct UnknownStatus(pub String);

/// Lifecycle status of an order.
///
/// ```text
/// Order ──cancel()──► Cancel
/// ```
/// `Order` is initial, `Cancel` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Order,
    Cancel,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Order => "ORDER",
            OrderStatus::Cancel => "CANCEL",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancel)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORDER" => Ok(OrderStatus::Order),
            "CANCEL" => Ok(OrderStatus::Cancel),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Shipment status of a delivery.
///
/// An order can be cancelled while its delivery is `Ready`; once `Shipped`
/// cancellation is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    #[default]
    Ready,
    Shipped,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Ready => "READY",
            DeliveryStatus::Shipped => "SHIPPED",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(DeliveryStatus::Ready),
            "SHIPPED" => Ok(DeliveryStatus::Shipped),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_starts_at_order() {
        assert_eq!(OrderStatus::default(), OrderStatus::Order);
        assert!(!OrderStatus::Order.is_terminal());
        assert!(OrderStatus::Cancel.is_terminal());
    }

    #[test]
    fn status_text_round_trips_through_parse() {
        assert_eq!("CANCEL".parse::<OrderStatus>(), Ok(OrderStatus::Cancel));
        assert_eq!("SHIPPED".parse::<DeliveryStatus>(), Ok(DeliveryStatus::Shipped));
        assert_eq!(OrderStatus::Order.to_string(), "ORDER");
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "COMP".parse::<DeliveryStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("COMP".to_string()));
    }

    #[test]
    fn status_serializes_in_upper_case() {
        assert_eq!(serde_json::to_string(&OrderStatus::Cancel).unwrap(), "\"CANCEL\"");
    }
}
