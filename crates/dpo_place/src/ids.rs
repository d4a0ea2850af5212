//! Opaque ID newtypes for placement entities.
//!
//! [`CellId`], [`NetId`], [`PinId`], [`RowId`], [`SegmentId`], and
//! [`RegionId`] are thin `u32` wrappers used as arena indices into the
//! netlist, the row table, and the segment table. They are `Copy`, `Hash`,
//! and `Serialize`/`Deserialize`.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Creates an ID from a vector position.
            pub fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns the ID as a vector position.
            pub fn index(self) -> usize {
                self.0 as usize
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
    /// Opaque, copyable ID for a cell (movable or fixed) in the netlist.
    CellId
);

define_id!(
    /// Opaque, copyable ID for a net in the netlist.
    NetId
);

define_id!(
    /// Opaque, copyable ID for a pin in the netlist.
    PinId
);

define_id!(
    /// Opaque, copyable ID for a placement row, ordered bottom to top.
    RowId
);

define_id!(
    /// Opaque, copyable ID for a row segment.
    SegmentId
);

define_id!(
    /// Opaque, copyable ID for a fence region. Region 0 is the default region.
    RegionId
);

impl RegionId {
    /// The region of cells without a fence constraint.
    pub const DEFAULT: RegionId = RegionId(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn cell_id_roundtrip() {
        let id = CellId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
        assert_eq!(id.index(), 42);
        assert_eq!(CellId::from_index(42), id);
    }

    #[test]
    fn id_ordering() {
        assert!(SegmentId::from_raw(1) < SegmentId::from_raw(2));
        assert!(RowId::from_raw(0) < RowId::from_raw(10));
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
    fn default_region_is_zero() {
        assert_eq!(RegionId::DEFAULT.as_raw(), 0);
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
        assert_eq!(format!("{}", SegmentId::from_raw(7)), "7");
    }
}
