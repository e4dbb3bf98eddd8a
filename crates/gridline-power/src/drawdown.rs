//! The producer/consumer contract: steady drawdown registration, admission
//! checks and one-shot spikes.

use gridline_core::fixed::{Fixed64, Watts, energy_for, headroom, sum_watts};
use gridline_core::id::{DeviceId, GridId};

use crate::device::{Admission, Demand, DeviceKind, Link};
use crate::system::{PowerError, PowerSystem};

/// Where a successful spike is paid from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpikeSource {
    /// A generator, or a grid: nothing to deduct.
    Free,
    /// A battery: pays `wattage * spike_seconds` joules.
    Battery(DeviceId),
}

impl PowerSystem {
    // -----------------------------------------------------------------------
    // Load accounting
    // -----------------------------------------------------------------------

    /// Steady demand of a consumer. For a chained producer this is the
    /// combined demand of everything connected below it.
    pub fn power_consumption(&self, consumer: DeviceId) -> Watts {
        let mut total = Fixed64::ZERO;
        let mut stack = vec![consumer];
        let mut budget = self.devices.len() + 1;

        while let Some(id) = stack.pop() {
            budget = budget.saturating_sub(1);
            if budget == 0 {
                tracing::warn!(?consumer, "supply loop while summing consumption");
                break;
            }
            let Some(device) = self.devices.get(id) else {
                continue;
            };
            match device.kind.as_consumer().map(|c| c.demand()) {
                Some(Demand::Own(w)) => total = total.saturating_add(w),
                Some(Demand::Downstream) => stack.extend(device.connected.iter().copied()),
                None => {}
            }
        }
        total
    }

    /// Sum of the demand of the consumers a producer is currently powering.
    pub fn steady_load(&self, producer: DeviceId) -> Watts {
        self.devices.get(producer).map_or(Fixed64::ZERO, |d| {
            sum_watts(d.power_users.iter().map(|u| self.power_consumption(*u)))
        })
    }

    /// Load a producer is committed to carry once producing: every
    /// connected consumer, powered or not.
    fn committed_load(&self, producer: DeviceId) -> Watts {
        self.devices.get(producer).map_or(Fixed64::ZERO, |d| {
            sum_watts(d.connected.iter().map(|u| self.power_consumption(*u)))
        })
    }

    /// What a producer can deliver right now. Zero while not producing.
    /// A grid-backed producer can deliver its current load plus the spare
    /// capacity of the grid behind it.
    pub fn maximum_power(&self, producer: DeviceId) -> Watts {
        let Some(device) = self.devices.get(producer) else {
            return Fixed64::ZERO;
        };
        if !device.producing {
            return Fixed64::ZERO;
        }
        match device.kind.as_producer().map(|p| p.admission()) {
            Some(Admission::Fixed(capacity)) => capacity,
            Some(Admission::GridBacked) => {
                let spare = self
                    .upstream_grid(producer)
                    .map_or(Fixed64::ZERO, |g| self.grid_headroom(g));
                self.steady_load(producer).saturating_add(spare)
            }
            None => Fixed64::ZERO,
        }
    }

    /// Unused output of a producer.
    pub fn producer_headroom(&self, producer: DeviceId) -> Watts {
        headroom(self.maximum_power(producer), self.steady_load(producer))
    }

    // -----------------------------------------------------------------------
    // Steady drawdown
    // -----------------------------------------------------------------------

    /// Whether `producer` would admit `wattage` more steady load.
    ///
    /// Fixed producers require `capacity - load - wattage >= 0`, and a
    /// chained supply also asks everything above it. A producing grid
    /// member also needs `wattage` of grid headroom, since its direct load
    /// is taken out of what it offers the grid. Grid-backed producers
    /// always admit. Unknown devices and non-producers never do.
    pub fn can_begin_drawdown(&self, producer: DeviceId, wattage: Watts) -> bool {
        let mut current = producer;
        for _ in 0..=self.devices.len() {
            let Some(device) = self.devices.get(current) else {
                return false;
            };
            let Some(admission) = device.kind.as_producer().map(|p| p.admission()) else {
                return false;
            };
            match admission {
                Admission::GridBacked => return true,
                Admission::Fixed(capacity) => {
                    let load = self.committed_load(current);
                    if capacity.saturating_sub(load).saturating_sub(wattage) < Fixed64::ZERO {
                        return false;
                    }
                }
            }
            match device.link {
                Link::Producer(up) => current = up,
                Link::Grid(grid) if device.is_root_producer() && device.producing => {
                    return self.grid_headroom(grid) >= wattage;
                }
                Link::Grid(_) | Link::None => return true,
            }
        }
        false
    }

    /// Register `consumer` as a steady load on `producer`.
    ///
    /// A consumer linked elsewhere is moved. Registering the same pair again
    /// is a no-op. If the producer is producing, the consumer is cut in at
    /// once; otherwise it waits until the producer starts.
    pub fn begin_drawdown(&mut self, producer: DeviceId, consumer: DeviceId) -> Result<(), PowerError> {
        let p = self.device_ref(producer)?;
        if p.kind.as_producer().is_none() {
            return Err(missing(producer, &p.kind, "producer"));
        }
        let c = self.device_ref(consumer)?;
        if c.kind.as_consumer().is_none() {
            return Err(missing(consumer, &c.kind, "consumer"));
        }
        if c.link == Link::Producer(producer) {
            return Ok(());
        }
        if self.is_upstream_of(consumer, producer) {
            return Err(PowerError::WouldCycle { producer, consumer });
        }

        self.detach(consumer)?;
        self.device_mut(consumer)?.link = Link::Producer(producer);
        let p = self.device_mut(producer)?;
        p.connected.push(consumer);
        let producing = p.producing;
        tracing::debug!(?producer, ?consumer, producing, "drawdown registered");

        if producing {
            self.cut_in(consumer);
        }
        self.propagate_load_change(producer);
        Ok(())
    }

    /// Withdraw `consumer`'s steady load from `producer`, cutting it out if
    /// it was powered. No-op if the consumer was not drawing from it.
    pub fn end_drawdown(&mut self, producer: DeviceId, consumer: DeviceId) -> Result<(), PowerError> {
        if self.link_of(consumer) != Link::Producer(producer) {
            return Ok(());
        }
        if self.is_powered(consumer) {
            self.cut_out(consumer);
        }
        if let Some(p) = self.devices.get_mut(producer) {
            p.connected.retain(|c| *c != consumer);
            p.power_users.retain(|c| *c != consumer);
        }
        self.device_mut(consumer)?.link = Link::None;
        tracing::debug!(?producer, ?consumer, "drawdown ended");

        self.propagate_load_change(producer);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Spikes
    // -----------------------------------------------------------------------

    /// Whether `producer` could deliver a one-shot draw of `wattage` now.
    pub fn can_drawdown_spike(&self, producer: DeviceId, wattage: Watts) -> bool {
        self.spike_source(producer, wattage).is_some()
    }

    /// Deliver a one-shot draw of `wattage`. Returns `false` without side
    /// effects when it cannot be met; a battery pays for a successful spike
    /// from its stored energy.
    pub fn drawdown_spike(&mut self, producer: DeviceId, wattage: Watts) -> bool {
        let Some(source) = self.spike_source(producer, wattage) else {
            tracing::trace!(?producer, %wattage, "spike refused");
            return false;
        };
        if let SpikeSource::Battery(battery) = source {
            let energy = energy_for(wattage, self.config.spike_seconds);
            let mut emptied = false;
            if let Some(DeviceKind::Battery(b)) = self.devices.get_mut(battery).map(|d| &mut d.kind) {
                b.stored = b.stored.saturating_sub(energy).max(Fixed64::ZERO);
                emptied = b.stored == Fixed64::ZERO;
            }
            if emptied {
                self.refresh_producer(battery);
            }
        }
        true
    }

    /// Walk up from `producer` until something that can pay for the spike
    /// is found, checking headroom at every level.
    fn spike_source(&self, producer: DeviceId, wattage: Watts) -> Option<SpikeSource> {
        let mut current = producer;
        for _ in 0..=self.devices.len() {
            let device = self.devices.get(current)?;
            if !device.producing {
                return None;
            }
            match device.kind.as_producer()?.admission() {
                Admission::GridBacked => {}
                Admission::Fixed(capacity) => {
                    if headroom(capacity, self.steady_load(current)) < wattage {
                        return None;
                    }
                }
            }
            if device.is_root_producer() {
                if let Link::Grid(grid) = device.link {
                    if self.grid_headroom(grid) < wattage {
                        return None;
                    }
                }
            }
            if let DeviceKind::Battery(b) = &device.kind {
                let energy = energy_for(wattage, self.config.spike_seconds);
                return (b.stored >= energy).then_some(SpikeSource::Battery(current));
            }
            if device.is_root_producer() {
                return Some(SpikeSource::Free);
            }
            match device.link {
                Link::Producer(up) => current = up,
                Link::Grid(grid) => return self.grid_spike(grid, wattage),
                Link::None => return None,
            }
        }
        None
    }

    fn grid_spike(&self, grid: GridId, wattage: Watts) -> Option<SpikeSource> {
        (self.grid_headroom(grid) >= wattage).then_some(SpikeSource::Free)
    }
}

fn missing(device: DeviceId, kind: &DeviceKind, capability: &'static str) -> PowerError {
    PowerError::MissingCapability {
        device,
        kind: kind.label(),
        capability,
    }
}
