//! Electrical grids: membership, aggregate accounting and load shedding.
//!
//! A grid owns two ordered membership lists. Recalculation sums the supply
//! of its producers and then walks consumers in registration order, powering
//! each one whose demand still fits the remaining budget (first-fit). Joins
//! are never refused; an under-supplied grid browns out by shedding the
//! consumers that do not fit.

use std::collections::BTreeSet;

use gridline_core::fixed::{Fixed64, Watts, headroom, sum_watts};
use gridline_core::id::{DeviceId, GridId, LocationId};

use crate::device::{GridRole, Link};
use crate::system::{PowerError, PowerEvent, PowerSystem};

// ---------------------------------------------------------------------------
// ElectricalGrid
// ---------------------------------------------------------------------------

/// Producers and consumers that are electrically joined.
///
/// Membership only changes through [`PowerSystem::join_grid`] and
/// [`PowerSystem::leave_grid`], which keep the device side of the link in
/// step.
#[derive(Debug, Clone)]
pub struct ElectricalGrid {
    id: GridId,
    owner: Option<DeviceId>,
    /// Producer devices (registration order).
    producers: Vec<DeviceId>,
    /// Consumer devices (registration order; also the shedding priority).
    consumers: Vec<DeviceId>,
    coverage: BTreeSet<LocationId>,
    pub(crate) total_supply: Watts,
    pub(crate) total_drawdown: Watts,
    /// Whether the last recalculation had to shed load.
    pub(crate) was_brownout: bool,
}

impl ElectricalGrid {
    pub(crate) fn new(id: GridId, owner: Option<DeviceId>) -> Self {
        Self {
            id,
            owner,
            producers: Vec::new(),
            consumers: Vec::new(),
            coverage: BTreeSet::new(),
            total_supply: Fixed64::ZERO,
            total_drawdown: Fixed64::ZERO,
            was_brownout: false,
        }
    }

    pub fn id(&self) -> GridId {
        self.id
    }

    /// The device whose destruction deletes this grid, if any.
    pub fn owner(&self) -> Option<DeviceId> {
        self.owner
    }

    pub fn producers(&self) -> &[DeviceId] {
        &self.producers
    }

    pub fn consumers(&self) -> &[DeviceId] {
        &self.consumers
    }

    pub fn coverage(&self) -> impl Iterator<Item = LocationId> + '_ {
        self.coverage.iter().copied()
    }

    pub fn covers(&self, location: LocationId) -> bool {
        self.coverage.contains(&location)
    }

    /// What member producers offer the grid, as of the last recalculation:
    /// each one's maximum output less the load it carries directly.
    pub fn total_supply(&self) -> Watts {
        self.total_supply
    }

    /// Sum of the demand of powered consumers, as of the last recalculation.
    pub fn total_drawdown(&self) -> Watts {
        self.total_drawdown
    }

    pub fn headroom(&self) -> Watts {
        headroom(self.total_supply, self.total_drawdown)
    }

    pub fn is_brownout(&self) -> bool {
        self.was_brownout
    }

    pub fn contains(&self, device: DeviceId) -> bool {
        self.producers.contains(&device) || self.consumers.contains(&device)
    }

    fn add_member(&mut self, device: DeviceId, role: GridRole) {
        let list = match role {
            GridRole::Producer => &mut self.producers,
            GridRole::Consumer => &mut self.consumers,
        };
        if !list.contains(&device) {
            list.push(device);
        }
    }

    fn remove_member(&mut self, device: DeviceId) {
        self.producers.retain(|d| *d != device);
        self.consumers.retain(|d| *d != device);
    }
}

// ---------------------------------------------------------------------------
// Grid operations
// ---------------------------------------------------------------------------

impl PowerSystem {
    /// Attach a device to a grid on the side given by its grid role.
    ///
    /// A consumer is first detached from whatever it drew from before.
    /// Joining the grid a device is already on is a no-op.
    pub fn join_grid(&mut self, device: DeviceId, grid: GridId) -> Result<(), PowerError> {
        if !self.grids.contains_key(&grid) {
            return Err(PowerError::UnknownGrid(grid));
        }
        let role = self.grid_role_of(device)?;
        if self.device_ref(device)?.link == Link::Grid(grid) {
            return Ok(());
        }

        self.detach(device)?;
        if let Some(g) = self.grids.get_mut(&grid) {
            g.add_member(device, role);
        }
        self.device_mut(device)?.link = Link::Grid(grid);
        tracing::debug!(?device, grid = grid.0, ?role, "joined grid");

        self.recalculate_grid(grid);
        Ok(())
    }

    /// Detach a device from its grid, cutting it out first if it was powered.
    /// No-op if the device is not on a grid.
    pub fn leave_grid(&mut self, device: DeviceId) -> Result<(), PowerError> {
        let Link::Grid(grid) = self.device_ref(device)?.link else {
            return Ok(());
        };

        if self.is_powered(device) {
            self.cut_out(device);
        }
        if let Some(g) = self.grids.get_mut(&grid) {
            g.remove_member(device);
        }
        self.device_mut(device)?.link = Link::None;
        tracing::debug!(?device, grid = grid.0, "left grid");

        self.recalculate_grid(grid);
        Ok(())
    }

    /// Recompute supply and drawdown and cut consumers in or out so the
    /// powered set matches first-fit allocation in registration order.
    ///
    /// Idempotent: a second call with unchanged inputs changes nothing and
    /// emits nothing.
    pub fn recalculate_grid(&mut self, grid: GridId) {
        let Some(g) = self.grids.get(&grid) else {
            return;
        };
        let producers = g.producers.clone();
        let consumers = g.consumers.clone();
        let was_brownout = g.was_brownout;

        // A producer's direct consumers come first; the grid gets the rest.
        let supply = sum_watts(producers.iter().map(|p| self.producer_headroom(*p)));

        let mut budget = supply;
        let mut requested = Fixed64::ZERO;
        let mut to_cut_out = Vec::new();
        let mut to_cut_in = Vec::new();
        for &consumer in &consumers {
            let demand = self.power_consumption(consumer);
            requested = requested.saturating_add(demand);
            let fits = supply > Fixed64::ZERO && demand <= budget;
            if fits {
                budget -= demand;
                if !self.is_powered(consumer) {
                    to_cut_in.push(consumer);
                }
            } else if self.is_powered(consumer) {
                to_cut_out.push(consumer);
            }
        }

        // Shed first so the budget is never over-committed mid-cascade.
        for consumer in to_cut_out {
            self.cut_out(consumer);
        }
        for consumer in to_cut_in {
            self.cut_in(consumer);
        }

        let drawdown = sum_watts(
            consumers
                .iter()
                .filter(|c| self.is_powered(**c))
                .map(|c| self.power_consumption(*c)),
        );
        let is_brownout = requested > drawdown;
        let tick = self.tick;

        if let Some(g) = self.grids.get_mut(&grid) {
            g.total_supply = supply;
            g.total_drawdown = drawdown;
            g.was_brownout = is_brownout;
        }
        tracing::trace!(grid = grid.0, %supply, %drawdown, %requested, "grid recalculated");

        if is_brownout && !was_brownout {
            let deficit = requested.saturating_sub(supply).max(Fixed64::ZERO);
            tracing::debug!(grid = grid.0, %deficit, "grid browning out");
            self.emit(PowerEvent::GridBrownout {
                grid,
                deficit,
                tick,
            });
        } else if !is_brownout && was_brownout {
            tracing::debug!(grid = grid.0, "grid restored");
            self.emit(PowerEvent::GridRestored { grid, tick });
        }
    }

    /// Grow a grid's reach to `location`. Returns `false` if the grid is
    /// unknown or already covered the location.
    pub fn extend_grid(&mut self, grid: GridId, location: LocationId) -> bool {
        self.grids
            .get_mut(&grid)
            .is_some_and(|g| g.coverage.insert(location))
    }

    /// The lowest-numbered grid covering `location`.
    pub fn grid_at(&self, location: LocationId) -> Option<GridId> {
        self.grids
            .values()
            .find(|g| g.covers(location))
            .map(|g| g.id)
    }

    /// Spare capacity of a grid; zero for unknown grids.
    pub fn grid_headroom(&self, grid: GridId) -> Watts {
        self.grids.get(&grid).map_or(Fixed64::ZERO, |g| g.headroom())
    }

    /// Delete a grid. Every powered consumer is cut out (receiving "power
    /// removed" through the usual cascade) and every member is unlinked
    /// before the grid leaves the registry. Returns `false` for unknown grids.
    pub fn delete_grid(&mut self, grid: GridId) -> bool {
        let Some(g) = self.grids.get(&grid) else {
            return false;
        };
        let consumers = g.consumers.clone();
        let producers = g.producers.clone();

        for consumer in consumers {
            if self.is_powered(consumer) {
                self.cut_out(consumer);
            }
            self.unlink_from_grid(consumer, grid);
        }
        for producer in producers {
            self.unlink_from_grid(producer, grid);
        }

        self.grids.remove(&grid);
        let tick = self.tick;
        self.emit(PowerEvent::GridDeleted { grid, tick });
        tracing::debug!(grid = grid.0, "grid deleted");
        true
    }

    fn unlink_from_grid(&mut self, device: DeviceId, grid: GridId) {
        if let Some(d) = self.devices.get_mut(device) {
            if d.link == Link::Grid(grid) {
                d.link = Link::None;
            }
        }
    }

    pub(crate) fn grid_role_of(&self, device: DeviceId) -> Result<GridRole, PowerError> {
        let d = self.device_ref(device)?;
        d.kind
            .as_grid_connectable()
            .map(|g| g.grid_role())
            .ok_or(PowerError::MissingCapability {
                device,
                kind: d.kind.label(),
                capability: "grid member",
            })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
