use serde::{Deserialize, Serialize};

/// Declares a store-assigned numeric identifier.
///
/// Identifiers are allocated from a sequence by the datastore when the row is
/// first written, so they wrap a plain `i64` rather than a random value.
macro_rules! store_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw identifier value.
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw identifier value.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

store_id!(
    /// Identifier of an order root.
    OrderId
);

store_id!(
    /// Identifier of a member (customer).
    MemberId
);

store_id!(
    /// Identifier of a catalog item.
    ItemId
);

store_id!(
    /// Identifier of the delivery owned by an order.
    DeliveryId
);

store_id!(
    /// Identifier of a single order line.
    OrderItemId
);
