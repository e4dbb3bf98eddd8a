//! Serde data file structs for power settings and the device catalog.
//!
//! Numbers are plain floats on disk and are converted to fixed-point by the
//! loader, which also rejects negative or non-finite values.

use serde::Deserialize;

// ===========================================================================
// Top level
// ===========================================================================

/// Contents of a `power.{ron,toml,json}` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowerFileData {
    #[serde(default)]
    pub settings: SettingsData,
    #[serde(default)]
    pub devices: Vec<DeviceTemplateData>,
}

// ===========================================================================
// Settings
// ===========================================================================

/// Tunables of the power system.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsData {
    /// Seconds a spike draw lasts; batteries pay `watts * spike_seconds`.
    #[serde(default = "default_spike_seconds")]
    pub spike_seconds: f64,
    #[serde(default)]
    pub command_history: usize,
    #[serde(default = "default_event_history")]
    pub event_history: usize,
}

fn default_spike_seconds() -> f64 {
    1.0
}

fn default_event_history() -> usize {
    256
}

impl Default for SettingsData {
    fn default() -> Self {
        Self {
            spike_seconds: default_spike_seconds(),
            command_history: 0,
            event_history: default_event_history(),
        }
    }
}

// ===========================================================================
// Device catalog
// ===========================================================================

/// A named device template.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceTemplateData {
    pub name: String,
    pub kind: DeviceKindData,
}

fn default_true() -> bool {
    true
}

/// The device variant and its parameters.
#[derive(Debug, Clone, Deserialize)]
pub enum DeviceKindData {
    Generator {
        capacity: f64,
        #[serde(default = "default_true")]
        switched_on: bool,
        #[serde(default)]
        primary_load_time: bool,
    },
    Battery {
        capacity: f64,
        max_stored: f64,
        #[serde(default)]
        stored: f64,
        #[serde(default = "default_true")]
        switched_on: bool,
        #[serde(default)]
        primary_load_time: bool,
    },
    PowerSupply {
        capacity: f64,
        #[serde(default)]
        primary_load_time: bool,
    },
    GridOutlet {
        #[serde(default)]
        primary_load_time: bool,
    },
    Appliance {
        demand: f64,
    },
}
