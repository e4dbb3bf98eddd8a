//! Gridline Power -- electrical power distribution between devices.
//!
//! Producers (generators, batteries, wattage-limited supplies, grid outlets)
//! feed consumers either directly or through shared electrical grids. The
//! [`PowerSystem`] keeps the two sides of every relation in step and
//! propagates "power arrived" / "power removed" through arbitrarily long
//! chains of producers.
//!
//! # Design
//!
//! - Devices live in a slotmap and refer to each other only by id. Each
//!   device has a single upstream [`Link`]: nothing, a grid, or a producer.
//! - The set of device kinds is closed ([`DeviceKind`]); capabilities are
//!   answered by `match`, never by inspecting types at runtime.
//! - A device can be producer and consumer at once. A chained producer
//!   produces exactly while it is powered.
//! - Grids shed load first-fit in registration order when supply runs short,
//!   and emit [`PowerEvent::GridBrownout`] / [`PowerEvent::GridRestored`]
//!   only on transitions.
//! - Notifications are queued and delivered after the mutating call returns,
//!   so listeners cannot re-enter a cascade in progress.
//! - Mutations from other threads go through a [`CommandSender`] and are
//!   applied at the next [`PowerSystem::tick`].
//!
//! [`CommandSender`]: gridline_core::command_queue::CommandSender

mod cascade;
pub mod command;
pub mod config;
mod connect;
mod controls;
pub mod device;
mod drawdown;
pub mod grid;
pub mod lifecycle;
pub mod snapshot;
pub mod system;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use command::PowerCommand;
pub use config::PowerConfig;
pub use device::{
    Admission, Appliance, Battery, Capabilities, ConnectsToGrid, ConsumesPower, Demand, Device,
    DeviceKind, Generator, GridOutlet, GridRole, Link, Origin, PowerSupply, ProducesPower,
};
pub use grid::ElectricalGrid;
pub use lifecycle::SavedLink;
pub use snapshot::{LinkSnapshot, SnapshotError, load_links};
pub use system::{PowerError, PowerEvent, PowerSystem};
pub use validation::InvariantViolation;
