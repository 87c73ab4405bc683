use common::{Address, DeliveryId, DeliveryStatus};
use order_store::DeliveryRecord;

use super::OrderError;

/// Delivery owned by exactly one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    id: Option<DeliveryId>,
    address: Address,
    status: DeliveryStatus,
}

impl Delivery {
    /// Creates an unsaved delivery to the given address, ready to ship.
    pub fn new(address: Address) -> Self {
        Self {
            id: None,
            address,
            status: DeliveryStatus::Ready,
        }
    }

    pub fn id(&self) -> Option<DeliveryId> {
        self.id
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    /// Marks the delivery as shipped.
    pub fn ship(&mut self) -> Result<(), OrderError> {
        if self.status == DeliveryStatus::Shipped {
            return Err(OrderError::AlreadyShipped);
        }
        self.status = DeliveryStatus::Shipped;
        Ok(())
    }

    pub(crate) fn assign_id(&mut self, id: DeliveryId) {
        self.id = Some(id);
    }

    pub(crate) fn from_record(record: DeliveryRecord) -> Self {
        Self {
            id: Some(record.id),
            address: record.address,
            status: record.status,
        }
    }
}
