use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Runtime handle of a device (generator, supply, appliance) in a power system.
    pub struct DeviceId;
}

/// Stable numeric identifier of an electrical grid.
///
/// `GridId(0)` is reserved: persisted data uses it to mean "unconnected", so
/// no live grid ever carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridId(pub u32);

impl GridId {
    /// The reserved "no grid" id.
    pub const NONE: GridId = GridId(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// Host-assigned stable id of a device. Survives save/load, unlike [`DeviceId`].
///
/// `DeviceSerial(0)` is reserved for "no device".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceSerial(pub u32);

impl DeviceSerial {
    /// The reserved "no device" serial.
    pub const NONE: DeviceSerial = DeviceSerial(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// Opaque host location (room, cell, tile) a grid can extend over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocationId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_id_zero_is_none() {
        assert!(GridId(0).is_none());
        assert!(GridId::NONE.is_none());
        assert!(!GridId(1).is_none());
    }

    #[test]
    fn device_serial_zero_is_none() {
        assert!(DeviceSerial::NONE.is_none());
        assert!(!DeviceSerial(7).is_none());
    }

    #[test]
    fn grid_ids_order_numerically() {
        let mut ids = vec![GridId(3), GridId(1), GridId(2)];
        ids.sort();
        assert_eq!(ids, vec![GridId(1), GridId(2), GridId(3)]);
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(LocationId(4), "engine room");
        map.insert(LocationId(5), "bridge");
        assert_eq!(map[&LocationId(4)], "engine room");
    }

    #[test]
    fn device_ids_from_slotmap_are_distinct() {
        let mut sm = slotmap::SlotMap::<DeviceId, ()>::with_key();
        let a = sm.insert(());
        let b = sm.insert(());
        assert_ne!(a, b);
    }
}
