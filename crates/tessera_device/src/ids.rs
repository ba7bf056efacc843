//! Opaque ID newtypes for device-model entities.
//!
//! Each ID is a thin `u32` wrapper that is `Copy`, `Hash`, and
//! `Serialize`/`Deserialize`. These IDs reference physical tile types and
//! logical block types within a device model.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a physical tile type in the device grid.
    TileTypeId
);

define_id!(
    /// Opaque, copyable ID for a logical block type mapped onto tiles.
    BlockTypeId
);
