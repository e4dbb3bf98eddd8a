//! Device variants and their power capabilities.
//!
//! The set of device kinds is closed. Each variant struct implements the
//! capability traits it supports, and [`DeviceKind`] answers "is this device
//! also a producer?" with a `match`, never with runtime type inspection.

use gridline_core::fixed::{Fixed64, Joules, Watts};
use gridline_core::id::{DeviceId, DeviceSerial, GridId, LocationId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// How a producer decides whether to accept new steady load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Accept while `capacity - steady_load - wattage >= 0`.
    Fixed(Watts),
    /// Always accept; the grid behind the producer does the real accounting.
    GridBacked,
}

/// Where a producer's ability to produce comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Self-contained source; the flag says whether it can produce right now.
    Internal(bool),
    /// Produces exactly while it is itself powered by its upstream.
    Upstream,
}

/// How much steady power a consumer asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demand {
    /// A fixed wattage of its own.
    Own(Watts),
    /// The combined demand of whatever it supplies further down the chain.
    Downstream,
}

/// The side of a grid a device attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridRole {
    Producer,
    Consumer,
}

/// Producer-side parameters of a device variant.
pub trait ProducesPower {
    fn admission(&self) -> Admission;
    fn origin(&self) -> Origin;
    /// Joined before other devices when a world is restored.
    fn primary_load_time(&self) -> bool;
}

/// Consumer-side parameters of a device variant.
pub trait ConsumesPower {
    fn demand(&self) -> Demand;
}

/// Devices that can be attached to an [`crate::grid::ElectricalGrid`].
pub trait ConnectsToGrid {
    fn grid_role(&self) -> GridRole;
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// A fixed generator: power plant, prop generator, solar array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generator {
    /// Nameplate output in watts.
    pub capacity: Watts,
    pub switched_on: bool,
    pub primary_load_time: bool,
}

/// A stored-energy source. Produces while switched on and not empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battery {
    /// Maximum steady discharge in watts.
    pub capacity: Watts,
    /// Current charge in joules. Clamped to `[0, max_stored]`.
    pub stored: Joules,
    pub max_stored: Joules,
    pub switched_on: bool,
    pub primary_load_time: bool,
}

/// A wattage-limited supply that draws from an upstream producer or grid and
/// feeds its own consumers (an implant power supply, a body power plant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerSupply {
    pub capacity: Watts,
    pub primary_load_time: bool,
}

/// A grid-backed supply point (a prop-mounted outlet). Admits any load and
/// leaves the limit to the grid it hangs off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridOutlet {
    pub primary_load_time: bool,
}

/// A plain consumer: a tool, lamp or implant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appliance {
    pub demand: Watts,
}

impl ProducesPower for Generator {
    fn admission(&self) -> Admission {
        Admission::Fixed(self.capacity)
    }

    fn origin(&self) -> Origin {
        Origin::Internal(self.switched_on && self.capacity > Fixed64::ZERO)
    }

    fn primary_load_time(&self) -> bool {
        self.primary_load_time
    }
}

impl ConnectsToGrid for Generator {
    fn grid_role(&self) -> GridRole {
        GridRole::Producer
    }
}

impl ProducesPower for Battery {
    fn admission(&self) -> Admission {
        Admission::Fixed(self.capacity)
    }

    fn origin(&self) -> Origin {
        Origin::Internal(
            self.switched_on && self.capacity > Fixed64::ZERO && self.stored > Fixed64::ZERO,
        )
    }

    fn primary_load_time(&self) -> bool {
        self.primary_load_time
    }
}

impl ConnectsToGrid for Battery {
    fn grid_role(&self) -> GridRole {
        GridRole::Producer
    }
}

impl ProducesPower for PowerSupply {
    fn admission(&self) -> Admission {
        Admission::Fixed(self.capacity)
    }

    fn origin(&self) -> Origin {
        Origin::Upstream
    }

    fn primary_load_time(&self) -> bool {
        self.primary_load_time
    }
}

impl ConsumesPower for PowerSupply {
    fn demand(&self) -> Demand {
        Demand::Downstream
    }
}

impl ConnectsToGrid for PowerSupply {
    fn grid_role(&self) -> GridRole {
        GridRole::Consumer
    }
}

impl ProducesPower for GridOutlet {
    fn admission(&self) -> Admission {
        Admission::GridBacked
    }

    fn origin(&self) -> Origin {
        Origin::Upstream
    }

    fn primary_load_time(&self) -> bool {
        self.primary_load_time
    }
}

impl ConsumesPower for GridOutlet {
    fn demand(&self) -> Demand {
        Demand::Downstream
    }
}

impl ConnectsToGrid for GridOutlet {
    fn grid_role(&self) -> GridRole {
        GridRole::Consumer
    }
}

impl ConsumesPower for Appliance {
    fn demand(&self) -> Demand {
        Demand::Own(self.demand)
    }
}

impl ConnectsToGrid for Appliance {
    fn grid_role(&self) -> GridRole {
        GridRole::Consumer
    }
}

// ---------------------------------------------------------------------------
// DeviceKind
// ---------------------------------------------------------------------------

/// The closed set of device variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    Generator(Generator),
    Battery(Battery),
    PowerSupply(PowerSupply),
    GridOutlet(GridOutlet),
    Appliance(Appliance),
}

/// Statically known capability summary of a [`DeviceKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub produces: bool,
    pub consumes: bool,
    pub grid_role: Option<GridRole>,
}

impl DeviceKind {
    pub fn as_producer(&self) -> Option<&dyn ProducesPower> {
        match self {
            DeviceKind::Generator(g) => Some(g),
            DeviceKind::Battery(b) => Some(b),
            DeviceKind::PowerSupply(s) => Some(s),
            DeviceKind::GridOutlet(o) => Some(o),
            DeviceKind::Appliance(_) => None,
        }
    }

    pub fn as_consumer(&self) -> Option<&dyn ConsumesPower> {
        match self {
            DeviceKind::PowerSupply(s) => Some(s),
            DeviceKind::GridOutlet(o) => Some(o),
            DeviceKind::Appliance(a) => Some(a),
            DeviceKind::Generator(_) | DeviceKind::Battery(_) => None,
        }
    }

    pub fn as_grid_connectable(&self) -> Option<&dyn ConnectsToGrid> {
        match self {
            DeviceKind::Generator(g) => Some(g),
            DeviceKind::Battery(b) => Some(b),
            DeviceKind::PowerSupply(s) => Some(s),
            DeviceKind::GridOutlet(o) => Some(o),
            DeviceKind::Appliance(a) => Some(a),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            produces: self.as_producer().is_some(),
            consumes: self.as_consumer().is_some(),
            grid_role: self.as_grid_connectable().map(|g| g.grid_role()),
        }
    }

    /// Short human-readable name, used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::Generator(_) => "generator",
            DeviceKind::Battery(_) => "battery",
            DeviceKind::PowerSupply(_) => "power supply",
            DeviceKind::GridOutlet(_) => "grid outlet",
            DeviceKind::Appliance(_) => "appliance",
        }
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// A device's single upstream edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Link {
    #[default]
    None,
    /// Attached to a grid, on the side given by the device's [`GridRole`].
    Grid(GridId),
    /// Drawing from a producer.
    Producer(DeviceId),
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// A device registered with a [`crate::PowerSystem`].
///
/// Links and power state are owned by the system and only change through its
/// join/leave and drawdown operations.
#[derive(Debug, Clone)]
pub struct Device {
    pub kind: DeviceKind,
    pub serial: DeviceSerial,
    pub location: Option<LocationId>,
    pub(crate) link: Link,
    /// Link to restore on login, set while the device is logged out.
    pub(crate) remembered: Option<Link>,
    /// Consumer side: currently receiving power.
    pub(crate) powered: bool,
    /// Producer side: currently producing.
    pub(crate) producing: bool,
    /// Producer side: consumers registered against this producer, in order.
    pub(crate) connected: Vec<DeviceId>,
    /// Producer side: the subset of `connected` currently receiving power.
    pub(crate) power_users: Vec<DeviceId>,
}

impl Device {
    pub(crate) fn new(kind: DeviceKind, serial: DeviceSerial, location: Option<LocationId>) -> Self {
        Self {
            kind,
            serial,
            location,
            link: Link::None,
            remembered: None,
            powered: false,
            producing: false,
            connected: Vec::new(),
            power_users: Vec::new(),
        }
    }

    pub fn link(&self) -> Link {
        self.link
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn is_producing(&self) -> bool {
        self.producing
    }

    pub fn connected(&self) -> &[DeviceId] {
        &self.connected
    }

    pub fn power_users(&self) -> &[DeviceId] {
        &self.power_users
    }

    pub fn is_logged_out(&self) -> bool {
        self.remembered.is_some()
    }

    /// Whether this device produces on its own rather than through an upstream.
    pub(crate) fn is_root_producer(&self) -> bool {
        matches!(
            self.kind.as_producer().map(|p| p.origin()),
            Some(Origin::Internal(_))
        )
    }

    /// Whether this device produces exactly while powered.
    pub(crate) fn is_chained_producer(&self) -> bool {
        matches!(
            self.kind.as_producer().map(|p| p.origin()),
            Some(Origin::Upstream)
        )
    }
}
