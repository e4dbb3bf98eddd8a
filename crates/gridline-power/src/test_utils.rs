//! Shared test helpers for unit tests and the integration-test crate.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use gridline_core::fixed::watts;
use gridline_core::id::{DeviceId, DeviceSerial};

use crate::device::{Appliance, Battery, DeviceKind, Generator, GridOutlet, PowerSupply};
use crate::system::{PowerEvent, PowerSystem};

// ===========================================================================
// Device constructors
// ===========================================================================

pub fn generator_kind(capacity: f64, switched_on: bool) -> DeviceKind {
    DeviceKind::Generator(Generator {
        capacity: watts(capacity),
        switched_on,
        primary_load_time: false,
    })
}

pub fn battery_kind(capacity: f64, stored: f64, max_stored: f64) -> DeviceKind {
    DeviceKind::Battery(Battery {
        capacity: watts(capacity),
        stored: watts(stored),
        max_stored: watts(max_stored),
        switched_on: true,
        primary_load_time: false,
    })
}

pub fn supply_kind(capacity: f64) -> DeviceKind {
    DeviceKind::PowerSupply(PowerSupply {
        capacity: watts(capacity),
        primary_load_time: false,
    })
}

pub fn appliance_kind(demand: f64) -> DeviceKind {
    DeviceKind::Appliance(Appliance {
        demand: watts(demand),
    })
}

pub fn add_generator(sys: &mut PowerSystem, capacity: f64, switched_on: bool) -> DeviceId {
    add(sys, generator_kind(capacity, switched_on))
}

pub fn add_battery(sys: &mut PowerSystem, capacity: f64, stored: f64, max_stored: f64) -> DeviceId {
    add(sys, battery_kind(capacity, stored, max_stored))
}

pub fn add_supply(sys: &mut PowerSystem, capacity: f64) -> DeviceId {
    add(sys, supply_kind(capacity))
}

pub fn add_outlet(sys: &mut PowerSystem) -> DeviceId {
    add(sys, DeviceKind::GridOutlet(GridOutlet::default()))
}

pub fn add_appliance(sys: &mut PowerSystem, demand: f64) -> DeviceId {
    add(sys, appliance_kind(demand))
}

fn add(sys: &mut PowerSystem, kind: DeviceKind) -> DeviceId {
    sys.add_device(kind, DeviceSerial::NONE, None)
        .expect("unserialed devices never collide")
}

// ===========================================================================
// Event counting
// ===========================================================================

/// How many "power arrived" notifications `device` received.
pub fn arrivals(events: &[PowerEvent], device: DeviceId) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PowerEvent::PowerArrived { device: d, .. } if *d == device))
        .count()
}

/// How many "power removed" notifications `device` received.
pub fn removals(events: &[PowerEvent], device: DeviceId) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, PowerEvent::PowerRemoved { device: d, .. } if *d == device))
        .count()
}

/// Position of the first "power removed" notification for `device`.
pub fn removal_index(events: &[PowerEvent], device: DeviceId) -> Option<usize> {
    events
        .iter()
        .position(|e| matches!(e, PowerEvent::PowerRemoved { device: d, .. } if *d == device))
}

/// Position of the first "power arrived" notification for `device`.
pub fn arrival_index(events: &[PowerEvent], device: DeviceId) -> Option<usize> {
    events
        .iter()
        .position(|e| matches!(e, PowerEvent::PowerArrived { device: d, .. } if *d == device))
}
