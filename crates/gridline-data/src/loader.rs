//! Reads power data files and resolves them into settings and a catalog.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and the
//! conversion from on-disk floats to fixed-point device parameters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gridline_core::fixed::{Fixed64, checked_f64_to_fixed64};
use gridline_power::{
    Appliance, Battery, DeviceKind, Generator, GridOutlet, PowerConfig, PowerSupply, PowerSystem,
};
use serde::de::DeserializeOwned;

use crate::catalog::DeviceCatalog;
use crate::schema::{DeviceKindData, PowerFileData, SettingsData};

/// Base name of the power data file.
pub const POWER_FILE: &str = "power";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A numeric field is negative, not finite, or too large to represent.
    #[error("invalid {field} {value} for '{name}' in {file}")]
    InvalidValue {
        file: PathBuf,
        name: String,
        field: &'static str,
        value: f64,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml` or `.json` in `dir`.
///
/// Returns `Ok(None)` if none exists and `Err(ConflictingFormats)` if more
/// than one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
    }
}

// ===========================================================================
// Resolution
// ===========================================================================

/// Resolved contents of a power data directory.
#[derive(Debug, Clone, Default)]
pub struct PowerData {
    pub config: PowerConfig,
    pub catalog: DeviceCatalog,
}

impl PowerData {
    /// A fresh power system configured from this data.
    pub fn new_system(&self) -> PowerSystem {
        PowerSystem::with_config(self.config.clone())
    }
}

/// Load `power.{ron,toml,json}` from `dir`. A directory without one yields
/// the default configuration and an empty catalog.
pub fn load_power_data(dir: &Path) -> Result<PowerData, DataLoadError> {
    let Some(path) = find_data_file(dir, POWER_FILE)? else {
        tracing::debug!(dir = %dir.display(), "no power data file; using defaults");
        return Ok(PowerData::default());
    };
    load_power_file(&path)
}

/// Load and resolve a single power data file.
pub fn load_power_file(path: &Path) -> Result<PowerData, DataLoadError> {
    let data: PowerFileData = deserialize_file(path)?;
    let config = resolve_settings(&data.settings, path)?;

    let mut templates: HashMap<String, DeviceKind> = HashMap::new();
    let mut order = Vec::with_capacity(data.devices.len());
    for template in &data.devices {
        check_duplicate(&templates, &template.name, path)?;
        let kind = resolve_kind(&template.kind, &template.name, path)?;
        templates.insert(template.name.clone(), kind);
        order.push(template.name.clone());
    }
    tracing::debug!(file = %path.display(), templates = order.len(), "power data loaded");

    Ok(PowerData {
        config,
        catalog: DeviceCatalog::new(templates, order),
    })
}

/// Check whether a name already exists in a map.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

fn resolve_settings(settings: &SettingsData, file: &Path) -> Result<PowerConfig, DataLoadError> {
    Ok(PowerConfig {
        spike_seconds: non_negative(settings.spike_seconds, "spike_seconds", "settings", file)?,
        command_history: settings.command_history,
        event_history: settings.event_history,
    })
}

fn resolve_kind(kind: &DeviceKindData, name: &str, file: &Path) -> Result<DeviceKind, DataLoadError> {
    let value = |v: f64, field: &'static str| non_negative(v, field, name, file);

    Ok(match *kind {
        DeviceKindData::Generator {
            capacity,
            switched_on,
            primary_load_time,
        } => DeviceKind::Generator(Generator {
            capacity: value(capacity, "capacity")?,
            switched_on,
            primary_load_time,
        }),
        DeviceKindData::Battery {
            capacity,
            max_stored,
            stored,
            switched_on,
            primary_load_time,
        } => {
            let max_stored = value(max_stored, "max_stored")?;
            DeviceKind::Battery(Battery {
                capacity: value(capacity, "capacity")?,
                stored: value(stored, "stored")?.min(max_stored),
                max_stored,
                switched_on,
                primary_load_time,
            })
        }
        DeviceKindData::PowerSupply {
            capacity,
            primary_load_time,
        } => DeviceKind::PowerSupply(PowerSupply {
            capacity: value(capacity, "capacity")?,
            primary_load_time,
        }),
        DeviceKindData::GridOutlet { primary_load_time } => {
            DeviceKind::GridOutlet(GridOutlet { primary_load_time })
        }
        DeviceKindData::Appliance { demand } => DeviceKind::Appliance(Appliance {
            demand: value(demand, "demand")?,
        }),
    })
}

fn non_negative(
    value: f64,
    field: &'static str,
    name: &str,
    file: &Path,
) -> Result<Fixed64, DataLoadError> {
    checked_f64_to_fixed64(value)
        .filter(|v| *v >= Fixed64::ZERO)
        .ok_or_else(|| DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            name: name.to_string(),
            field,
            value,
        })
}

// ===========================================================================
// Tests
// ===========================================================================
