//! Persistence boundary for the order core.
//!
//! Every method on [`OrderStore`] is one round-trip to the datastore. Writes are
//! buffered in a [`UnitOfWork`] and applied atomically on commit.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;
pub mod unit_of_work;

pub use common::{
    Address, DeliveryId, DeliveryStatus, ItemId, MemberId, Money, OrderId, OrderItemId,
    OrderStatus,
};
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use query::{OrderFilter, Page, Sequence};
pub use record::{
    DeliveryRecord, ItemRecord, MemberRecord, OrderFetchRow, OrderFlatRow, OrderGraphRow,
    OrderItemRecord, OrderItemRow, OrderLineRow, OrderRecord, OrderSummaryRow,
};
pub use store::{OrderStore, OrderStoreExt, QueryKind};
pub use unit_of_work::{TxMode, UnitOfWork, Write};
