//! Parameter changes on individual devices and per-tick battery drain.
//!
//! Every change that can move a producer in or out of the producing state,
//! or change how much a consumer asks for, re-balances whatever sits above
//! the device.

use gridline_core::fixed::{Fixed64, Joules, Watts, energy_for};
use gridline_core::id::DeviceId;

use crate::device::{DeviceKind, Link};
use crate::system::{PowerError, PowerSystem};

impl PowerSystem {
    /// Flip a generator's or battery's switch.
    pub fn set_switched_on(&mut self, device: DeviceId, on: bool) -> Result<(), PowerError> {
        let d = self.device_mut(device)?;
        match &mut d.kind {
            DeviceKind::Generator(g) => g.switched_on = on,
            DeviceKind::Battery(b) => b.switched_on = on,
            other => return Err(missing(device, other, "switchable producer")),
        }
        tracing::debug!(?device, on, "switched");
        self.refresh_producer(device);
        Ok(())
    }

    /// Change the nameplate capacity of a fixed producer.
    ///
    /// Capacity is checked when load is admitted. Lowering it below the load
    /// already carried does not evict anyone, except on a grid, where the
    /// next recalculation sheds what no longer fits.
    pub fn set_capacity(&mut self, device: DeviceId, capacity: Watts) -> Result<(), PowerError> {
        let capacity = capacity.max(Fixed64::ZERO);
        let d = self.device_mut(device)?;
        match &mut d.kind {
            DeviceKind::Generator(g) => g.capacity = capacity,
            DeviceKind::Battery(b) => b.capacity = capacity,
            DeviceKind::PowerSupply(s) => s.capacity = capacity,
            other => return Err(missing(device, other, "fixed producer")),
        }
        tracing::debug!(?device, %capacity, "capacity changed");
        self.refresh_producer(device);
        Ok(())
    }

    /// Change an appliance's steady demand.
    pub fn set_demand(&mut self, device: DeviceId, demand: Watts) -> Result<(), PowerError> {
        let demand = demand.max(Fixed64::ZERO);
        let d = self.device_mut(device)?;
        match &mut d.kind {
            DeviceKind::Appliance(a) => a.demand = demand,
            other => return Err(missing(device, other, "appliance")),
        }
        let link = d.link;
        tracing::debug!(?device, %demand, "demand changed");

        match link {
            Link::Grid(grid) => self.recalculate_grid(grid),
            Link::Producer(producer) => self.propagate_load_change(producer),
            Link::None => {}
        }
        Ok(())
    }

    /// Add energy to a battery, clamped to its storage limit.
    pub fn charge_battery(&mut self, device: DeviceId, energy: Joules) -> Result<(), PowerError> {
        let d = self.device_mut(device)?;
        match &mut d.kind {
            DeviceKind::Battery(b) => {
                b.stored = b
                    .stored
                    .saturating_add(energy)
                    .clamp(Fixed64::ZERO, b.max_stored.max(Fixed64::ZERO));
            }
            other => return Err(missing(device, other, "battery")),
        }
        self.refresh_producer(device);
        Ok(())
    }

    /// Load a battery is carrying: its own power users plus its share of
    /// any grid it feeds, in proportion to its output.
    pub fn battery_load(&self, battery: DeviceId) -> Watts {
        let direct = self.steady_load(battery);
        let Some(Link::Grid(grid)) = self.devices.get(battery).map(|d| d.link) else {
            return direct;
        };
        let Some(g) = self.grids.get(&grid) else {
            return direct;
        };
        if g.total_supply <= Fixed64::ZERO {
            return direct;
        }
        let share = self
            .producer_headroom(battery)
            .checked_div(g.total_supply)
            .map_or(Fixed64::ZERO, |ratio| g.total_drawdown.saturating_mul(ratio));
        direct.saturating_add(share)
    }

    /// Discharge every producing battery by `dt_seconds` worth of its load.
    /// Batteries that run empty stop producing.
    pub(crate) fn drain_batteries(&mut self, dt_seconds: Fixed64) {
        let batteries: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|(_, d)| d.producing && matches!(d.kind, DeviceKind::Battery(_)))
            .map(|(id, _)| id)
            .collect();

        for battery in batteries {
            let energy = energy_for(self.battery_load(battery), dt_seconds);
            if energy <= Fixed64::ZERO {
                continue;
            }
            let mut emptied = false;
            if let Some(DeviceKind::Battery(b)) = self.devices.get_mut(battery).map(|d| &mut d.kind) {
                b.stored = b.stored.saturating_sub(energy).max(Fixed64::ZERO);
                emptied = b.stored == Fixed64::ZERO;
            }
            if emptied {
                tracing::debug!(?battery, "battery depleted");
                self.refresh_producer(battery);
            }
        }
    }
}

fn missing(device: DeviceId, kind: &DeviceKind, capability: &'static str) -> PowerError {
    PowerError::MissingCapability {
        device,
        kind: kind.label(),
        capability,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use gridline_core::fixed::watts;

    fn stored(sys: &PowerSystem, battery: DeviceId) -> Joules {
        match &sys.device(battery).unwrap().kind {
            DeviceKind::Battery(b) => b.stored,
            _ => unreachable!(),
        }
    }

    #[test]
    fn switching_off_cuts_out_users() {
        let mut sys = PowerSystem::new();
        let generator = add_generator(&mut sys, 10.0, true);
        let lamp = add_appliance(&mut sys, 1.0);
        sys.begin_drawdown(generator, lamp).unwrap();

        sys.set_switched_on(generator, false).unwrap();
        assert!(!sys.is_producing(generator));
        assert!(!sys.is_powered(lamp));

        sys.set_switched_on(generator, true).unwrap();
        assert!(sys.is_powered(lamp));
    }

    #[test]
    fn switch_on_appliance_is_error() {
        let mut sys = PowerSystem::new();
        let lamp = add_appliance(&mut sys, 1.0);
        assert!(matches!(
            sys.set_switched_on(lamp, true),
            Err(PowerError::MissingCapability { .. })
        ));
    }

    #[test]
    fn zero_capacity_stops_generator() {
        let mut sys = PowerSystem::new();
        let generator = add_generator(&mut sys, 10.0, true);
        sys.set_capacity(generator, Fixed64::ZERO).unwrap();
        assert!(!sys.is_producing(generator));
    }

    #[test]
    fn demand_change_rebalances_grid() {
        let mut sys = PowerSystem::new();
        let grid = sys.create_grid(None);
        let generator = add_generator(&mut sys, 10.0, true);
        let a = add_appliance(&mut sys, 5.0);
        let b = add_appliance(&mut sys, 5.0);
        for d in [generator, a, b] {
            sys.join_grid(d, grid).unwrap();
        }
        assert!(sys.is_powered(b));

        sys.set_demand(a, watts(8.0)).unwrap();
        assert!(sys.is_powered(a));
        assert!(!sys.is_powered(b));
        assert_eq!(sys.total_drawdown(grid), watts(8.0));
    }

    #[test]
    fn demand_change_below_outlet_rebalances_grid() {
        let mut sys = PowerSystem::new();
        let grid = sys.create_grid(None);
        let generator = add_generator(&mut sys, 10.0, true);
        let outlet = add_outlet(&mut sys);
        let drill = add_appliance(&mut sys, 4.0);
        sys.join_grid(generator, grid).unwrap();
        sys.join_grid(outlet, grid).unwrap();
        sys.begin_drawdown(outlet, drill).unwrap();

        sys.set_demand(drill, watts(12.0)).unwrap();
        assert!(!sys.is_powered(outlet));
        assert!(!sys.is_powered(drill));
        assert!(sys.grid(grid).unwrap().is_brownout());
    }

    #[test]
    fn charge_clamps_to_limit_and_restarts_battery() {
        let mut sys = PowerSystem::new();
        let battery = add_battery(&mut sys, 10.0, 0.0, 100.0);
        assert!(!sys.is_producing(battery));

        sys.charge_battery(battery, watts(500.0)).unwrap();
        assert_eq!(stored(&sys, battery), watts(100.0));
        assert!(sys.is_producing(battery));
    }

    #[test]
    fn drain_empties_battery_and_cuts_out() {
        let mut sys = PowerSystem::new();
        let battery = add_battery(&mut sys, 10.0, 20.0, 100.0);
        let lamp = add_appliance(&mut sys, 10.0);
        sys.begin_drawdown(battery, lamp).unwrap();

        sys.drain_batteries(Fixed64::ONE);
        assert_eq!(stored(&sys, battery), watts(10.0));
        assert!(sys.is_powered(lamp));

        sys.drain_batteries(Fixed64::ONE);
        assert!(!sys.is_producing(battery));
        assert!(!sys.is_powered(lamp));
    }

    #[test]
    fn grid_battery_pays_its_share() {
        let mut sys = PowerSystem::new();
        let grid = sys.create_grid(None);
        let generator = add_generator(&mut sys, 30.0, true);
        let battery = add_battery(&mut sys, 10.0, 100.0, 100.0);
        let load = add_appliance(&mut sys, 20.0);
        for d in [generator, battery, load] {
            sys.join_grid(d, grid).unwrap();
        }

        assert_eq!(sys.battery_load(battery), watts(5.0));
    }
}
