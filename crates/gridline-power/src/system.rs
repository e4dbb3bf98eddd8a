//! The [`PowerSystem`]: device registry, grid registry and event outbox.
//!
//! All relations between devices and grids are held as ids resolved through
//! this struct. Devices never point at each other directly.

use std::collections::{BTreeMap, HashMap};

use gridline_core::command_queue::{CommandQueue, CommandSender};
use gridline_core::event::{EventBus, Listener};
use gridline_core::fixed::{Fixed64, Ticks, Watts};
use gridline_core::id::{DeviceId, DeviceSerial, GridId, LocationId};
use slotmap::SlotMap;

use crate::command::PowerCommand;
use crate::config::PowerConfig;
use crate::device::{Device, DeviceKind, Link};
use crate::grid::ElectricalGrid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Misuse of the power API. Ordinary absence (no grid, no capacity) is never
/// an error; these are programming mistakes by the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PowerError {
    #[error("device not found: {0:?}")]
    UnknownDevice(DeviceId),
    #[error("grid not found: {0:?}")]
    UnknownGrid(GridId),
    #[error("{kind} {device:?} cannot act as a {capability}")]
    MissingCapability {
        device: DeviceId,
        kind: &'static str,
        capability: &'static str,
    },
    #[error("connecting {consumer:?} to {producer:?} would create a supply cycle")]
    WouldCycle {
        producer: DeviceId,
        consumer: DeviceId,
    },
    #[error("grid id {0:?} is already registered")]
    DuplicateGrid(GridId),
    #[error("device serial {0:?} is already registered")]
    DuplicateSerial(DeviceSerial),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Notifications emitted by the power system, delivered after the call that
/// caused them has returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerEvent {
    /// A consumer started receiving power ("power arrived").
    PowerArrived { device: DeviceId, tick: Ticks },
    /// A consumer stopped receiving power ("power removed").
    PowerRemoved { device: DeviceId, tick: Ticks },
    /// A grid started shedding load because demand exceeds supply.
    GridBrownout {
        grid: GridId,
        /// Requested demand minus total supply.
        deficit: Watts,
        tick: Ticks,
    },
    /// A grid went back to powering every consumer.
    GridRestored { grid: GridId, tick: Ticks },
    /// A grid was deleted after releasing all its members.
    GridDeleted { grid: GridId, tick: Ticks },
}

// ---------------------------------------------------------------------------
// PowerSystem
// ---------------------------------------------------------------------------

/// Owns every device and grid and runs all power-state transitions.
///
/// All mutation happens through `&mut self` on the simulation thread. Work
/// from other threads goes through [`PowerSystem::command_sender`] and is
/// applied by [`PowerSystem::tick`].
#[derive(Debug)]
pub struct PowerSystem {
    pub(crate) devices: SlotMap<DeviceId, Device>,
    pub(crate) grids: BTreeMap<GridId, ElectricalGrid>,
    pub(crate) serials: HashMap<DeviceSerial, DeviceId>,
    pub(crate) events: EventBus<PowerEvent>,
    pub(crate) commands: CommandQueue<PowerCommand>,
    pub(crate) config: PowerConfig,
    pub(crate) tick: Ticks,
    next_grid_id: u32,
}

impl Default for PowerSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerSystem {
    pub fn new() -> Self {
        Self::with_config(PowerConfig::default())
    }

    pub fn with_config(config: PowerConfig) -> Self {
        Self {
            devices: SlotMap::with_key(),
            grids: BTreeMap::new(),
            serials: HashMap::new(),
            events: EventBus::new(config.event_history),
            commands: CommandQueue::with_max_history(config.command_history),
            config,
            tick: 0,
            next_grid_id: 1,
        }
    }

    pub fn config(&self) -> &PowerConfig {
        &self.config
    }

    /// The current simulation tick.
    pub fn current_tick(&self) -> Ticks {
        self.tick
    }

    // -----------------------------------------------------------------------
    // Devices
    // -----------------------------------------------------------------------

    /// Register a device. It starts unlinked; root producers that can produce
    /// start producing immediately (they have no consumers yet).
    ///
    /// A non-zero `serial` must be unique; it is what persisted links refer to.
    pub fn add_device(
        &mut self,
        kind: DeviceKind,
        serial: DeviceSerial,
        location: Option<LocationId>,
    ) -> Result<DeviceId, PowerError> {
        if !serial.is_none() && self.serials.contains_key(&serial) {
            return Err(PowerError::DuplicateSerial(serial));
        }
        let mut device = Device::new(kind, serial, location);
        device.producing = self.origin_allows_production(&device);
        let label = device.kind.label();
        let id = self.devices.insert(device);
        if !serial.is_none() {
            self.serials.insert(serial, id);
        }
        tracing::debug!(?id, ?serial, kind = label, "device added");
        Ok(id)
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &Device)> {
        self.devices.iter()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Resolve a persisted serial to a live device.
    pub fn device_by_serial(&self, serial: DeviceSerial) -> Option<DeviceId> {
        if serial.is_none() {
            return None;
        }
        self.serials.get(&serial).copied()
    }

    pub fn is_powered(&self, id: DeviceId) -> bool {
        self.devices.get(id).is_some_and(|d| d.powered)
    }

    /// Whether the device is a producer in the producing state.
    pub fn is_producing(&self, id: DeviceId) -> bool {
        self.devices.get(id).is_some_and(|d| d.producing)
    }

    pub fn link_of(&self, id: DeviceId) -> Link {
        self.devices.get(id).map_or(Link::None, |d| d.link)
    }

    pub(crate) fn device_ref(&self, id: DeviceId) -> Result<&Device, PowerError> {
        self.devices.get(id).ok_or(PowerError::UnknownDevice(id))
    }

    pub(crate) fn device_mut(&mut self, id: DeviceId) -> Result<&mut Device, PowerError> {
        self.devices.get_mut(id).ok_or(PowerError::UnknownDevice(id))
    }

    /// Whether a device's own switch or charge lets it produce. Chained
    /// producers answer with their powered state.
    pub(crate) fn origin_allows_production(&self, device: &Device) -> bool {
        use crate::device::Origin;
        match device.kind.as_producer().map(|p| p.origin()) {
            Some(Origin::Internal(can)) => can,
            Some(Origin::Upstream) => device.powered,
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Grids
    // -----------------------------------------------------------------------

    /// Create an empty grid with a fresh id, optionally owned by a device.
    /// Owned grids are deleted together with their owner.
    pub fn create_grid(&mut self, owner: Option<DeviceId>) -> GridId {
        let id = GridId(self.next_grid_id);
        self.next_grid_id += 1;
        self.grids.insert(id, ElectricalGrid::new(id, owner));
        tracing::debug!(grid = id.0, ?owner, "grid created");
        id
    }

    /// Re-create a grid under a persisted id (world load).
    pub fn create_grid_with_id(
        &mut self,
        id: GridId,
        owner: Option<DeviceId>,
    ) -> Result<GridId, PowerError> {
        if id.is_none() || self.grids.contains_key(&id) {
            return Err(PowerError::DuplicateGrid(id));
        }
        self.next_grid_id = self.next_grid_id.max(id.0.saturating_add(1));
        self.grids.insert(id, ElectricalGrid::new(id, owner));
        Ok(id)
    }

    pub fn grid(&self, id: GridId) -> Option<&ElectricalGrid> {
        self.grids.get(&id)
    }

    pub fn grids(&self) -> impl Iterator<Item = &ElectricalGrid> {
        self.grids.values()
    }

    /// Combined supply of a grid; zero for unknown grids.
    pub fn total_supply(&self, id: GridId) -> Watts {
        self.grids.get(&id).map_or(Fixed64::ZERO, |g| g.total_supply)
    }

    /// Combined draw of the powered consumers on a grid; zero for unknown grids.
    pub fn total_drawdown(&self, id: GridId) -> Watts {
        self.grids.get(&id).map_or(Fixed64::ZERO, |g| g.total_drawdown)
    }

    // -----------------------------------------------------------------------
    // Events and commands
    // -----------------------------------------------------------------------

    pub(crate) fn emit(&mut self, event: PowerEvent) {
        self.events.emit(event);
    }

    /// Deliver and return every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<PowerEvent> {
        self.events.deliver()
    }

    /// Events emitted but not yet drained.
    pub fn pending_events(&self) -> &[PowerEvent] {
        self.events.pending()
    }

    /// Register a passive listener, called on each delivered event.
    pub fn subscribe(&mut self, listener: Listener<PowerEvent>) {
        self.events.subscribe(listener);
    }

    /// A `Send` handle for queueing commands from outside the tick thread.
    pub fn command_sender(&self) -> CommandSender<PowerCommand> {
        self.commands.sender()
    }

    /// Queue a command from the tick thread; applied on the next [`tick`](Self::tick).
    pub fn queue_command(&mut self, command: PowerCommand) {
        self.commands.push(command);
    }

    /// Commands already applied, as (tick, command), when history is enabled.
    pub fn command_history(&self) -> &[(Ticks, PowerCommand)] {
        self.commands.history()
    }
}
