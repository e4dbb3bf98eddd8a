//! Host lifecycle hooks: world load, login, quit and deletion.
//!
//! Persisted links name their target by stable number (grid id or device
//! serial) with 0 meaning "unconnected". A link whose target no longer
//! exists is dropped with a warning; loading never fails because of one.

use gridline_core::id::{DeviceId, DeviceSerial, GridId};
use serde::{Deserialize, Serialize};

use crate::device::Link;
use crate::system::{PowerError, PowerSystem};

/// A device's upstream link in persistable form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SavedLink {
    #[default]
    Unconnected,
    Grid(GridId),
    Producer(DeviceSerial),
}

impl SavedLink {
    /// Whether this record names a target at all.
    pub fn is_connected(&self) -> bool {
        match self {
            SavedLink::Unconnected => false,
            SavedLink::Grid(g) => !g.is_none(),
            SavedLink::Producer(s) => !s.is_none(),
        }
    }
}

/// Restore priority. Lower loads first.
fn load_rank(sys: &PowerSystem, device: DeviceId) -> u8 {
    let Some(d) = sys.device(device) else {
        return 3;
    };
    match d.kind.as_producer() {
        Some(p) if p.primary_load_time() => 0,
        Some(_) => 1,
        None => 2,
    }
}

impl PowerSystem {
    /// The link to persist for `device`. A logged-out device reports the
    /// link it will restore on login.
    pub fn saved_link(&self, device: DeviceId) -> SavedLink {
        let Some(d) = self.devices.get(device) else {
            return SavedLink::Unconnected;
        };
        match d.remembered.unwrap_or(d.link) {
            Link::None => SavedLink::Unconnected,
            Link::Grid(grid) => SavedLink::Grid(grid),
            Link::Producer(producer) => self
                .devices
                .get(producer)
                .map(|p| p.serial)
                .filter(|s| !s.is_none())
                .map_or(SavedLink::Unconnected, SavedLink::Producer),
        }
    }

    /// Re-establish a device's persisted link after the world finished
    /// loading. Grids the device owns are extended to its location.
    ///
    /// Returns whether a link was established.
    pub fn on_load_finished(&mut self, device: DeviceId, saved: SavedLink) -> Result<bool, PowerError> {
        let location = self.device_ref(device)?.location;
        if let Some(location) = location {
            let owned: Vec<GridId> = self.grids_owned_by(device);
            for grid in owned {
                self.extend_grid(grid, location);
            }
        }

        match self.resolve_saved(device, saved) {
            Some(link) => Ok(self.attach(device, link)),
            None => Ok(false),
        }
    }

    /// Restore a device that was logged out when the world was saved: keep
    /// its persisted link for [`on_login`](Self::on_login) without
    /// connecting it now.
    pub fn on_load_logged_out(&mut self, device: DeviceId, saved: SavedLink) -> Result<(), PowerError> {
        self.detach(device)?;
        let link = self.resolve_saved(device, saved).unwrap_or(Link::None);
        self.device_mut(device)?.remembered = Some(link);
        tracing::debug!(?device, ?link, "restored logged out");
        Ok(())
    }

    fn resolve_saved(&self, device: DeviceId, saved: SavedLink) -> Option<Link> {
        match saved {
            SavedLink::Unconnected => None,
            SavedLink::Grid(grid) if grid.is_none() => None,
            SavedLink::Producer(serial) if serial.is_none() => None,
            SavedLink::Grid(grid) => Some(Link::Grid(grid)),
            SavedLink::Producer(serial) => {
                let producer = self.device_by_serial(serial);
                if producer.is_none() {
                    tracing::warn!(?device, ?serial, "saved producer no longer exists; left unconnected");
                }
                producer.map(Link::Producer)
            }
        }
    }

    /// A device's host went away: drop its live connection but remember it.
    /// Consumers it was feeding stay registered and lose power through the
    /// usual cascade.
    pub fn on_quit(&mut self, device: DeviceId) -> Result<(), PowerError> {
        let d = self.device_ref(device)?;
        if d.remembered.is_some() {
            return Ok(());
        }
        let link = d.link;
        self.detach(device)?;
        self.device_mut(device)?.remembered = Some(link);
        tracing::debug!(?device, ?link, "device logged out");
        Ok(())
    }

    /// The host came back: re-attach the link remembered at quit.
    /// Returns whether a link was established.
    pub fn on_login(&mut self, device: DeviceId) -> Result<bool, PowerError> {
        let Some(link) = self.device_mut(device)?.remembered.take() else {
            return Ok(false);
        };
        tracing::debug!(?device, ?link, "device logged in");
        Ok(self.attach(device, link))
    }

    /// Release everything a device holds and unregister it: its own link,
    /// the draw of every consumer connected to it, and grids it owns.
    pub fn on_delete(&mut self, device: DeviceId) -> Result<(), PowerError> {
        self.device_ref(device)?;
        self.detach(device)?;

        let connected = self.device_ref(device)?.connected.clone();
        for consumer in connected {
            self.end_drawdown(device, consumer)?;
        }
        for grid in self.grids_owned_by(device) {
            self.delete_grid(grid);
        }

        if let Some(removed) = self.devices.remove(device) {
            if !removed.serial.is_none() {
                self.serials.remove(&removed.serial);
            }
            tracing::debug!(?device, kind = removed.kind.label(), "device deleted");
        }
        Ok(())
    }

    /// Re-link a batch of loaded devices in a deterministic order: producers
    /// flagged for primary load time first, then other producers, then plain
    /// consumers. Within a rank the input order is kept.
    ///
    /// Returns how many links were established.
    pub fn restore_world(&mut self, records: &[(DeviceId, SavedLink)]) -> usize {
        let mut ordered = records.to_vec();
        ordered.sort_by_key(|(device, _)| load_rank(self, *device));

        let mut linked = 0;
        for (device, saved) in ordered {
            match self.on_load_finished(device, saved) {
                Ok(true) => linked += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(?device, %err, "skipping device during restore"),
            }
        }
        tracing::debug!(records = records.len(), linked, "world restored");
        linked
    }

    pub(crate) fn grids_owned_by(&self, device: DeviceId) -> Vec<GridId> {
        self.grids
            .values()
            .filter(|g| g.owner() == Some(device))
            .map(|g| g.id())
            .collect()
    }

    /// Try to establish `link`, logging instead of failing.
    fn attach(&mut self, device: DeviceId, link: Link) -> bool {
        let result = match link {
            Link::None => return false,
            Link::Grid(grid) => self.join_grid(device, grid),
            Link::Producer(producer) => self.begin_drawdown(producer, device),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(?device, ?link, %err, "could not restore link; left unconnected");
                false
            }
        }
    }
}
