//! Binary snapshots of the connection table.
//!
//! Device parameters belong to the host and are re-registered by it on load.
//! What this module persists is the part only the power system knows: which
//! grids exist, what they cover, who owns them, and every device's upstream
//! link. Encoded with `bitcode` behind a versioned header.

use gridline_core::fixed::Ticks;
use gridline_core::id::{DeviceId, DeviceSerial, GridId, LocationId};
use serde::{Deserialize, Serialize};

use crate::lifecycle::SavedLink;
use crate::system::PowerSystem;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a gridline link snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x6D1D_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick at which the snapshot was taken.
    pub tick: Ticks,
}

impl SnapshotHeader {
    pub fn new(tick: Ticks) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(SnapshotError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// A grid as persisted. The owner is named by serial; `DeviceSerial::NONE`
/// means the grid has no owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRecord {
    pub id: GridId,
    pub owner: DeviceSerial,
    pub coverage: Vec<LocationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub serial: DeviceSerial,
    pub link: SavedLink,
    /// The device was logged out; `link` is what it gets back on login.
    pub logged_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub header: SnapshotHeader,
    pub grids: Vec<GridRecord>,
    pub links: Vec<LinkRecord>,
}

/// Decode and validate a snapshot produced by [`PowerSystem::save_links`].
pub fn load_links(data: &[u8]) -> Result<LinkSnapshot, SnapshotError> {
    let snapshot: LinkSnapshot =
        bitcode::deserialize(data).map_err(|e| SnapshotError::Decode(e.to_string()))?;
    snapshot.header.validate()?;
    Ok(snapshot)
}

impl PowerSystem {
    /// Capture grids and links. Devices without a serial cannot be named
    /// in a snapshot and are skipped.
    pub fn snapshot_links(&self) -> LinkSnapshot {
        let grids = self
            .grids
            .values()
            .map(|g| GridRecord {
                id: g.id(),
                owner: g
                    .owner()
                    .and_then(|o| self.devices.get(o))
                    .map_or(DeviceSerial::NONE, |d| d.serial),
                coverage: g.coverage().collect(),
            })
            .collect();

        let links = self
            .devices
            .iter()
            .filter(|(_, d)| !d.serial.is_none())
            .map(|(id, d)| LinkRecord {
                serial: d.serial,
                link: self.saved_link(id),
                logged_out: d.is_logged_out(),
            })
            .collect();

        LinkSnapshot {
            header: SnapshotHeader::new(self.tick),
            grids,
            links,
        }
    }

    /// Encode [`snapshot_links`](Self::snapshot_links) to bytes.
    pub fn save_links(&self) -> Result<Vec<u8>, SnapshotError> {
        bitcode::serialize(&self.snapshot_links()).map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    /// Re-create the snapshot's grids and re-link every device the host has
    /// already re-registered under the same serial. Devices saved while
    /// logged out stay disconnected until [`on_login`](Self::on_login).
    /// Grids whose id is taken and records naming unknown serials are
    /// skipped with a warning.
    ///
    /// Returns how many live links were established.
    pub fn restore_links(&mut self, snapshot: &LinkSnapshot) -> usize {
        for record in &snapshot.grids {
            let owner = self.device_by_serial(record.owner);
            if let Err(err) = self.create_grid_with_id(record.id, owner) {
                tracing::warn!(grid = record.id.0, %err, "skipping saved grid");
                continue;
            }
            for location in &record.coverage {
                self.extend_grid(record.id, *location);
            }
        }

        let mut live = Vec::new();
        let mut parked = Vec::new();
        for record in &snapshot.links {
            let Some(device) = self.device_by_serial(record.serial) else {
                tracing::warn!(serial = record.serial.0, "saved device not registered; skipping");
                continue;
            };
            if record.logged_out {
                parked.push((device, record.link));
            } else {
                live.push((device, record.link));
            }
        }

        let linked = self.restore_world(&live);
        for (device, saved) in parked {
            if let Err(err) = self.on_load_logged_out(device, saved) {
                tracing::warn!(?device, %err, "skipping logged out device during restore");
            }
        }
        linked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Link;
    use crate::test_utils::*;

    fn build(sys: &mut PowerSystem) -> (DeviceId, DeviceId, DeviceId) {
        let plant = sys
            .add_device(generator_kind(50.0, true), DeviceSerial(1), Some(LocationId(4)))
            .unwrap();
        let supply = sys.add_device(supply_kind(20.0), DeviceSerial(2), None).unwrap();
        let lamp = sys.add_device(appliance_kind(5.0), DeviceSerial(3), None).unwrap();
        (plant, supply, lamp)
    }

    #[test]
    fn header_validation() {
        assert!(SnapshotHeader::new(3).validate().is_ok());
        let mut bad = SnapshotHeader::new(3);
        bad.magic = 1;
        assert!(matches!(bad.validate(), Err(SnapshotError::InvalidMagic(1))));
        let mut future = SnapshotHeader::new(3);
        future.version = FORMAT_VERSION + 1;
        assert!(matches!(future.validate(), Err(SnapshotError::FutureVersion(_))));
    }

    #[test]
    fn save_and_restore_links() {
        let mut sys = PowerSystem::new();
        let (plant, supply, lamp) = build(&mut sys);
        let grid = sys.create_grid(Some(plant));
        sys.extend_grid(grid, LocationId(4));
        sys.join_grid(plant, grid).unwrap();
        sys.join_grid(supply, grid).unwrap();
        sys.begin_drawdown(supply, lamp).unwrap();
        let bytes = sys.save_links().unwrap();

        let snapshot = load_links(&bytes).unwrap();
        assert_eq!(snapshot.grids.len(), 1);
        assert_eq!(snapshot.grids[0].owner, DeviceSerial(1));

        let mut restored = PowerSystem::new();
        let (plant2, supply2, lamp2) = build(&mut restored);
        assert_eq!(restored.restore_links(&snapshot), 3);

        assert_eq!(restored.grid_of(plant2), Some(grid));
        assert_eq!(restored.grid_of(supply2), Some(grid));
        assert!(restored.is_powered(lamp2));
        assert_eq!(restored.grid(grid).unwrap().owner(), Some(plant2));
        assert_eq!(restored.grid_at(LocationId(4)), Some(grid));
    }

    #[test]
    fn logged_out_device_stays_disconnected_after_reload() {
        let mut sys = PowerSystem::new();
        let (plant, supply, lamp) = build(&mut sys);
        sys.begin_drawdown(plant, supply).unwrap();
        sys.begin_drawdown(supply, lamp).unwrap();
        sys.on_quit(supply).unwrap();
        let snapshot = load_links(&sys.save_links().unwrap()).unwrap();

        let quit = snapshot
            .links
            .iter()
            .find(|r| r.serial == DeviceSerial(2))
            .unwrap();
        assert!(quit.logged_out);
        assert_eq!(quit.link, SavedLink::Producer(DeviceSerial(1)));

        let mut restored = PowerSystem::new();
        let (plant2, supply2, lamp2) = build(&mut restored);
        assert_eq!(restored.restore_links(&snapshot), 1);
        assert!(restored.device(supply2).unwrap().is_logged_out());
        assert_eq!(restored.link_of(supply2), Link::None);
        assert!(!restored.is_powered(lamp2));

        assert!(restored.on_login(supply2).unwrap());
        assert_eq!(restored.link_of(supply2), Link::Producer(plant2));
        assert!(restored.is_powered(lamp2));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(load_links(&[1, 2, 3]), Err(SnapshotError::Decode(_))));
    }

    #[test]
    fn unknown_serials_are_skipped() {
        let mut sys = PowerSystem::new();
        build(&mut sys);
        let snapshot = sys.snapshot_links();

        let mut empty = PowerSystem::new();
        assert_eq!(empty.restore_links(&snapshot), 0);
    }
}
