//! Explicit transaction scope.

use common::{DeliveryId, DeliveryStatus, ItemId, OrderId, OrderStatus};

use crate::record::{DeliveryRecord, ItemRecord, MemberRecord, OrderItemRecord, OrderRecord};
use crate::{Result, StoreError};

/// Access mode of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// A single buffered write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    InsertMember(MemberRecord),
    InsertItem(ItemRecord),
    /// Takes units out of stock; fails if fewer than `quantity` remain.
    RemoveItemStock {
        id: ItemId,
        quantity: u32,
    },
    /// Puts units back into stock.
    AddItemStock {
        id: ItemId,
        quantity: u32,
    },
    InsertDelivery(DeliveryRecord),
    InsertOrder(OrderRecord),
    InsertOrderItem(OrderItemRecord),
    /// Sets the status only if the row still holds `expected`.
    UpdateOrderStatus {
        id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    },
    /// Sets the status only if the row still holds `expected`.
    UpdateDeliveryStatus {
        id: DeliveryId,
        expected: DeliveryStatus,
        status: DeliveryStatus,
    },
}

/// Transaction scope opened by each service operation.
///
/// Writes are buffered and only reach the store through
/// [`OrderStoreExt::commit`](crate::OrderStoreExt::commit), which applies them
/// all or none. A unit of work dropped before commit discards its writes.
#[derive(Debug)]
pub struct UnitOfWork {
    mode: TxMode,
    writes: Vec<Write>,
    finished: bool,
}

impl UnitOfWork {
    pub fn begin(mode: TxMode) -> Self {
        Self {
            mode,
            writes: Vec::new(),
            finished: false,
        }
    }

    pub fn read_only() -> Self {
        Self::begin(TxMode::ReadOnly)
    }

    pub fn read_write() -> Self {
        Self::begin(TxMode::ReadWrite)
    }

    pub fn mode(&self) -> TxMode {
        self.mode
    }

    /// Buffers a write. Fails in a read-only unit of work.
    pub fn push(&mut self, write: Write) -> Result<()> {
        if self.mode == TxMode::ReadOnly {
            return Err(StoreError::ReadOnly);
        }
        self.writes.push(write);
        Ok(())
    }

    /// Returns the writes buffered so far, in issue order.
    pub fn pending(&self) -> &[Write] {
        &self.writes
    }

    pub(crate) fn take_writes(mut self) -> Vec<Write> {
        self.finished = true;
        std::mem::take(&mut self.writes)
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.finished && !self.writes.is_empty() {
            tracing::debug!(
                discarded = self.writes.len(),
                "unit of work dropped without commit, rolling back"
            );
        }
    }
}
