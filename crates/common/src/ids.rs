use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Defines a transparent UUID newtype with the standard constructors and
/// conversions. Keeps the id zoo honest: an `OrderId` never slots into a
/// parameter expecting a `WarehouseId`.
macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an order.
    OrderId
}

uuid_id! {
    /// Unique identifier for the user owning an order.
    UserId
}

uuid_id! {
    /// Unique identifier for a product.
    ProductId
}

uuid_id! {
    /// Unique identifier for a warehouse.
    ///
    /// Warehouse ids double as the deterministic tie-break for multi-row
    /// allocation: stock rows are locked and walked in ascending
    /// warehouse-id order.
    WarehouseId
}

uuid_id! {
    /// Unique identifier for a reservation fragment.
    ReservationId
}
