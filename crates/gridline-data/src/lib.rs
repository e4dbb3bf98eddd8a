//! Gridline Data -- power settings and device templates from data files.
//!
//! Reads `power.ron`, `power.toml` or `power.json` (exactly one) and yields a
//! [`PowerConfig`](gridline_power::PowerConfig) plus a [`DeviceCatalog`] of
//! named device templates.

pub mod catalog;
pub mod loader;
pub mod schema;

pub use catalog::{DeviceCatalog, SpawnError};
pub use loader::{DataLoadError, PowerData, load_power_data, load_power_file};
