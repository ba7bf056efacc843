//! Opaque ID newtypes for placement netlist entities.
//!
//! [`BlockId`], [`NetId`], and [`PinId`] are thin `u32` wrappers used as arena
//! indices into the placement netlist. They are `Copy`, `Hash`, and
//! `Serialize`/`Deserialize`.

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
    /// Opaque, copyable ID for a logic block in the placement netlist.
    BlockId
);

define_id!(
    /// Opaque, copyable ID for a net in the placement netlist.
    NetId
);

define_id!(
    /// Opaque, copyable ID for a pin in the placement netlist.
    PinId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn block_id_roundtrip() {
        let id = BlockId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
    }

    #[test]
    fn net_id_roundtrip() {
        let id = NetId::from_raw(99);
        assert_eq!(id.as_raw(), 99);
    }

    #[test]
    fn pin_id_roundtrip() {
        let id = PinId::from_raw(7);
        assert_eq!(id.as_raw(), 7);
    }

    #[test]
    fn id_equality() {
        let a = BlockId::from_raw(3);
        let b = BlockId::from_raw(3);
        let c = BlockId::from_raw(4);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn id_hash_in_set() {
        let mut set = HashSet::new();
        set.insert(NetId::from_raw(1));
        set.insert(NetId::from_raw(2));
        set.insert(NetId::from_raw(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = PinId::from_raw(55);
        let json = serde_json::to_string(&id).unwrap();
        let restored: PinId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn id_display() {
        let id = NetId::from_raw(42);
        assert_eq!(format!("{id}"), "42");
    }
}
