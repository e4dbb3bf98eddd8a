//! Structural consistency checks over the whole power system.
//!
//! Mutations keep these invariants by construction. [`PowerSystem::validate`]
//! re-derives them from scratch for tests and debugging tools.

use gridline_core::fixed::{Watts, sum_watts};
use gridline_core::id::{DeviceId, GridId};

use crate::device::{GridRole, Link};
use crate::system::PowerSystem;

/// A broken structural invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A power user that is not among the producer's connected consumers.
    PowerUserNotConnected { producer: DeviceId, consumer: DeviceId },
    /// A producer that is not producing still lists power users.
    IdleProducerHasUsers { producer: DeviceId },
    /// The two ends of a producer link disagree.
    ProducerLinkMismatch { producer: DeviceId, consumer: DeviceId },
    /// The two ends of a grid membership disagree.
    GridLinkMismatch { grid: GridId, device: DeviceId },
    /// A device is listed on the wrong side of a grid.
    WrongGridSide { grid: GridId, device: DeviceId },
    /// A powered consumer with no producing source above it.
    PoweredWithoutSource { device: DeviceId },
    /// A chained producer whose producing state differs from its powered state.
    ChainedStateMismatch { device: DeviceId },
    /// Cached grid drawdown differs from the demand of its powered consumers.
    DrawdownMismatch {
        grid: GridId,
        cached: Watts,
        actual: Watts,
    },
    /// Cached grid supply differs from what its producers can offer once
    /// their direct load is served.
    SupplyMismatch {
        grid: GridId,
        cached: Watts,
        actual: Watts,
    },
    /// A grid that draws more than it supplies.
    OverCommitted { grid: GridId },
    /// Following producer links from this device never ends.
    SupplyCycle { device: DeviceId },
}

impl PowerSystem {
    /// Check every structural invariant. Empty means consistent.
    pub fn validate(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        self.validate_devices(&mut violations);
        self.validate_grids(&mut violations);
        violations
    }

    fn validate_devices(&self, out: &mut Vec<InvariantViolation>) {
        for (id, device) in self.devices.iter() {
            for user in &device.power_users {
                if !device.connected.contains(user) {
                    out.push(InvariantViolation::PowerUserNotConnected {
                        producer: id,
                        consumer: *user,
                    });
                }
            }
            if !device.producing && !device.power_users.is_empty() {
                out.push(InvariantViolation::IdleProducerHasUsers { producer: id });
            }
            for consumer in &device.connected {
                if self.link_of(*consumer) != Link::Producer(id) {
                    out.push(InvariantViolation::ProducerLinkMismatch {
                        producer: id,
                        consumer: *consumer,
                    });
                }
            }
            if device.is_chained_producer() && device.producing != device.powered {
                out.push(InvariantViolation::ChainedStateMismatch { device: id });
            }

            match device.link {
                Link::Producer(producer) => {
                    let listed = self
                        .devices
                        .get(producer)
                        .is_some_and(|p| p.connected.contains(&id));
                    if !listed {
                        out.push(InvariantViolation::ProducerLinkMismatch {
                            producer,
                            consumer: id,
                        });
                    }
                    if device.powered
                        && !self
                            .devices
                            .get(producer)
                            .is_some_and(|p| p.producing && p.power_users.contains(&id))
                    {
                        out.push(InvariantViolation::PoweredWithoutSource { device: id });
                    }
                }
                Link::Grid(grid) => {
                    if !self.grids.get(&grid).is_some_and(|g| g.contains(id)) {
                        out.push(InvariantViolation::GridLinkMismatch { grid, device: id });
                    }
                }
                Link::None => {
                    if device.powered {
                        out.push(InvariantViolation::PoweredWithoutSource { device: id });
                    }
                }
            }

            if self.has_supply_cycle(id) {
                out.push(InvariantViolation::SupplyCycle { device: id });
            }
        }
    }

    fn validate_grids(&self, out: &mut Vec<InvariantViolation>) {
        for grid in self.grids.values() {
            let gid = grid.id();
            let sides = grid
                .producers()
                .iter()
                .map(|d| (*d, GridRole::Producer))
                .chain(grid.consumers().iter().map(|d| (*d, GridRole::Consumer)));
            for (device, side) in sides {
                if self.link_of(device) != Link::Grid(gid) {
                    out.push(InvariantViolation::GridLinkMismatch { grid: gid, device });
                }
                if self.grid_role_of(device).ok() != Some(side) {
                    out.push(InvariantViolation::WrongGridSide { grid: gid, device });
                }
            }

            let offered = sum_watts(grid.producers().iter().map(|p| self.producer_headroom(*p)));
            if offered != grid.total_supply() {
                out.push(InvariantViolation::SupplyMismatch {
                    grid: gid,
                    cached: grid.total_supply(),
                    actual: offered,
                });
            }

            let actual = sum_watts(
                grid.consumers()
                    .iter()
                    .filter(|c| self.is_powered(**c))
                    .map(|c| self.power_consumption(*c)),
            );
            if actual != grid.total_drawdown() {
                out.push(InvariantViolation::DrawdownMismatch {
                    grid: gid,
                    cached: grid.total_drawdown(),
                    actual,
                });
            }
            if grid.total_drawdown() > grid.total_supply() {
                out.push(InvariantViolation::OverCommitted { grid: gid });
            }
        }
    }

    fn has_supply_cycle(&self, start: DeviceId) -> bool {
        let mut current = start;
        for _ in 0..=self.devices.len() {
            match self.devices.get(current).map(|d| d.link) {
                Some(Link::Producer(up)) => current = up,
                _ => return false,
            }
        }
        true
    }
}
