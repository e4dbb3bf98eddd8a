use gridline_core::fixed::Fixed64;
use serde::{Deserialize, Serialize};

/// Tunables for a [`crate::PowerSystem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// How long a spike draw lasts, in seconds. A battery pays
    /// `wattage * spike_seconds` joules per spike.
    pub spike_seconds: Fixed64,
    /// Executed commands kept for inspection. 0 disables history.
    pub command_history: usize,
    /// Recent events kept in the event history ring.
    pub event_history: usize,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            spike_seconds: Fixed64::from_num(1),
            command_history: 0,
            event_history: 256,
        }
    }
}
