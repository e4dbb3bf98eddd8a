//! Cut-in / cut-out propagation through chains of producers.
//!
//! Supply relations form a forest: every consumer has at most one upstream.
//! Propagation therefore walks an explicit stack, visits each device at most
//! once per call, and never recurses. Order is registration order, depth
//! first. On cut-out a device's downstream hears "power removed" before the
//! device itself does.

use gridline_core::id::{DeviceId, GridId};

use crate::device::Link;
use crate::system::{PowerError, PowerEvent, PowerSystem};

/// Work item for the cut-out walk.
enum Frame {
    Enter(DeviceId),
    Finish(DeviceId),
}

impl PowerSystem {
    /// Mark `root` powered and propagate to every consumer below it that a
    /// now-producing chained producer supplies.
    ///
    /// The caller guarantees `root`'s upstream is producing.
    pub(crate) fn cut_in(&mut self, root: DeviceId) {
        let tick = self.tick;
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(device) = self.devices.get_mut(id) else {
                continue;
            };
            if device.powered {
                continue;
            }
            device.powered = true;
            let upstream = device.link;
            let downstream = if device.is_chained_producer() {
                device.producing = true;
                device.connected.clone()
            } else {
                Vec::new()
            };

            if let Link::Producer(producer) = upstream {
                if let Some(up) = self.devices.get_mut(producer) {
                    if !up.power_users.contains(&id) {
                        up.power_users.push(id);
                    }
                }
            }

            tracing::trace!(?id, "power arrived");
            self.emit(PowerEvent::PowerArrived { device: id, tick });
            stack.extend(downstream.into_iter().rev());
        }
    }

    /// Mark `root` unpowered, first cutting out everything it was feeding.
    pub(crate) fn cut_out(&mut self, root: DeviceId) {
        let tick = self.tick;
        let mut stack = vec![Frame::Enter(root)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    let Some(device) = self.devices.get_mut(id) else {
                        continue;
                    };
                    if !device.powered {
                        continue;
                    }
                    stack.push(Frame::Finish(id));
                    if device.producing && device.is_chained_producer() {
                        device.producing = false;
                        let users = device.power_users.clone();
                        stack.extend(users.into_iter().rev().map(Frame::Enter));
                    }
                }
                Frame::Finish(id) => {
                    let Some(device) = self.devices.get_mut(id) else {
                        continue;
                    };
                    debug_assert!(
                        device.power_users.is_empty(),
                        "downstream must be cut out before its supplier"
                    );
                    device.powered = false;
                    if let Link::Producer(producer) = device.link {
                        if let Some(up) = self.devices.get_mut(producer) {
                            up.power_users.retain(|u| *u != id);
                        }
                    }
                    tracing::trace!(?id, "power removed");
                    self.emit(PowerEvent::PowerRemoved { device: id, tick });
                }
            }
        }
    }

    /// A root producer became able to produce: power every connected consumer
    /// in registration order.
    pub(crate) fn start_producing(&mut self, producer: DeviceId) {
        let Some(device) = self.devices.get_mut(producer) else {
            return;
        };
        device.producing = true;
        let connected = device.connected.clone();
        tracing::debug!(?producer, consumers = connected.len(), "producer started");
        for consumer in connected {
            self.cut_in(consumer);
        }
    }

    /// A root producer can no longer produce: cut out everything it powers.
    pub(crate) fn stop_producing(&mut self, producer: DeviceId) {
        let Some(device) = self.devices.get_mut(producer) else {
            return;
        };
        device.producing = false;
        let users = device.power_users.clone();
        tracing::debug!(?producer, consumers = users.len(), "producer stopped");
        for user in users {
            self.cut_out(user);
        }
    }

    /// Re-evaluate a root producer after one of its own parameters changed.
    pub(crate) fn refresh_producer(&mut self, producer: DeviceId) {
        let Some(device) = self.devices.get(producer) else {
            return;
        };
        if !device.is_root_producer() {
            return;
        }
        let can_produce = self.origin_allows_production(device);
        let was_producing = device.producing;
        let link = device.link;

        if can_produce && !was_producing {
            self.start_producing(producer);
        } else if !can_produce && was_producing {
            self.stop_producing(producer);
        }
        if let Link::Grid(grid) = link {
            self.recalculate_grid(grid);
        }
    }

    /// The grid that ultimately carries `device`'s load, found by walking up
    /// producer links until a consumer-side grid link is reached.
    pub(crate) fn upstream_grid(&self, device: DeviceId) -> Option<GridId> {
        let mut current = device;
        for _ in 0..=self.devices.len() {
            let d = self.devices.get(current)?;
            match d.link {
                Link::Grid(grid) => {
                    return d.kind.as_consumer().map(|_| grid);
                }
                Link::Producer(up) => current = up,
                Link::None => return None,
            }
        }
        None
    }

    /// The load `producer` carries changed: let the grid above it re-balance.
    /// A grid-member producer changes what it offers its grid, so that grid
    /// re-balances too.
    pub(crate) fn propagate_load_change(&mut self, producer: DeviceId) {
        if let Some(grid) = self.carrying_grid(producer) {
            self.recalculate_grid(grid);
        }
    }

    /// The grid at the top of `device`'s chain, whichever side of it the
    /// topmost device sits on.
    fn carrying_grid(&self, device: DeviceId) -> Option<GridId> {
        let mut current = device;
        for _ in 0..=self.devices.len() {
            match self.devices.get(current)?.link {
                Link::Grid(grid) => return Some(grid),
                Link::Producer(up) => current = up,
                Link::None => return None,
            }
        }
        None
    }

    /// Whether `ancestor` sits on the producer chain above `device` (or is it).
    pub(crate) fn is_upstream_of(&self, ancestor: DeviceId, device: DeviceId) -> bool {
        let mut current = device;
        for _ in 0..=self.devices.len() {
            if current == ancestor {
                return true;
            }
            match self.devices.get(current).map(|d| d.link) {
                Some(Link::Producer(up)) => current = up,
                _ => return false,
            }
        }
        // A walk longer than the registry means a loop already exists.
        true
    }

    /// Remove a device's upstream link, whichever kind it is.
    pub(crate) fn detach(&mut self, device: DeviceId) -> Result<(), PowerError> {
        match self.device_ref(device)?.link {
            Link::None => Ok(()),
            Link::Grid(_) => self.leave_grid(device),
            Link::Producer(producer) => self.end_drawdown(producer, device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn cut_out_notifies_downstream_before_supplier() {
        let mut sys = PowerSystem::new();
        let generator = add_generator(&mut sys, 100.0, true);
        let supply = add_supply(&mut sys, 50.0);
        let lamp = add_appliance(&mut sys, 5.0);
        sys.begin_drawdown(generator, supply).unwrap();
        sys.begin_drawdown(supply, lamp).unwrap();
        sys.drain_events();

        sys.set_switched_on(generator, false).unwrap();

        let events = sys.drain_events();
        let lamp_at = removal_index(&events, lamp).unwrap();
        let supply_at = removal_index(&events, supply).unwrap();
        assert!(lamp_at < supply_at);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn cut_in_follows_registration_order_depth_first() {
        let mut sys = PowerSystem::new();
        let generator = add_generator(&mut sys, 100.0, false);
        let supply = add_supply(&mut sys, 50.0);
        let a = add_appliance(&mut sys, 1.0);
        let b = add_appliance(&mut sys, 1.0);
        let tail = add_appliance(&mut sys, 1.0);
        sys.begin_drawdown(generator, supply).unwrap();
        sys.begin_drawdown(supply, a).unwrap();
        sys.begin_drawdown(supply, b).unwrap();
        sys.begin_drawdown(generator, tail).unwrap();

        sys.set_switched_on(generator, true).unwrap();

        let events = sys.drain_events();
        let order: Vec<_> = [supply, a, b, tail]
            .iter()
            .map(|d| arrival_index(&events, *d).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn power_users_track_only_powered_consumers() {
        let mut sys = PowerSystem::new();
        let generator = add_generator(&mut sys, 100.0, false);
        let lamp = add_appliance(&mut sys, 5.0);
        sys.begin_drawdown(generator, lamp).unwrap();
        assert!(sys.device(generator).unwrap().power_users().is_empty());
        assert_eq!(sys.device(generator).unwrap().connected(), &[lamp]);

        sys.set_switched_on(generator, true).unwrap();
        assert_eq!(sys.device(generator).unwrap().power_users(), &[lamp]);
    }

    #[test]
    fn upstream_grid_resolves_through_chain() {
        let mut sys = PowerSystem::new();
        let grid = sys.create_grid(None);
        let outlet = add_outlet(&mut sys);
        let supply = add_supply(&mut sys, 10.0);
        let lamp = add_appliance(&mut sys, 1.0);
        sys.join_grid(outlet, grid).unwrap();
        sys.begin_drawdown(outlet, supply).unwrap();
        sys.begin_drawdown(supply, lamp).unwrap();

        assert_eq!(sys.upstream_grid(lamp), Some(grid));
        assert_eq!(sys.upstream_grid(outlet), Some(grid));
    }

    #[test]
    fn producer_side_grid_link_carries_no_load() {
        let mut sys = PowerSystem::new();
        let grid = sys.create_grid(None);
        let generator = add_generator(&mut sys, 10.0, true);
        sys.join_grid(generator, grid).unwrap();
        assert_eq!(sys.upstream_grid(generator), None);
    }

    #[test]
    fn lowered_supply_capacity_only_limits_new_load() {
        let mut sys = PowerSystem::new();
        let generator = add_generator(&mut sys, 100.0, true);
        let supply = add_supply(&mut sys, 50.0);
        let a = add_appliance(&mut sys, 20.0);
        let b = add_appliance(&mut sys, 20.0);
        sys.begin_drawdown(generator, supply).unwrap();
        sys.begin_drawdown(supply, a).unwrap();
        sys.begin_drawdown(supply, b).unwrap();

        sys.set_capacity(supply, gridline_core::fixed::watts(10.0)).unwrap();
        sys.set_switched_on(generator, false).unwrap();
        sys.set_switched_on(generator, true).unwrap();

        // Registered consumers come back in full; only new draw is refused.
        assert!(sys.is_powered(a));
        assert!(sys.is_powered(b));
        assert_eq!(sys.device(supply).unwrap().power_users(), &[a, b]);
        assert!(!sys.can_begin_drawdown(supply, gridline_core::fixed::Fixed64::ZERO));
        assert!(sys.validate().is_empty());
    }

    #[test]
    fn load_change_below_grid_producer_reaches_its_grid() {
        let mut sys = PowerSystem::new();
        let grid = sys.create_grid(None);
        let generator = add_generator(&mut sys, 10.0, true);
        let supply = add_supply(&mut sys, 10.0);
        let lamp = add_appliance(&mut sys, 4.0);
        sys.join_grid(generator, grid).unwrap();
        sys.begin_drawdown(generator, supply).unwrap();
        assert_eq!(sys.total_supply(grid), gridline_core::fixed::watts(10.0));

        sys.begin_drawdown(supply, lamp).unwrap();
        assert_eq!(sys.carrying_grid(lamp), Some(grid));
        assert_eq!(sys.total_supply(grid), gridline_core::fixed::watts(6.0));
    }

    #[test]
    fn detach_unlinked_device_is_noop() {
        let mut sys = PowerSystem::new();
        let lamp = add_appliance(&mut sys, 1.0);
        sys.detach(lamp).unwrap();
        assert_eq!(sys.link_of(lamp), Link::None);
    }
}
