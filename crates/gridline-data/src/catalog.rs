//! Named device templates and their instantiation into a power system.

use std::collections::HashMap;

use gridline_core::id::{DeviceId, DeviceSerial, LocationId};
use gridline_power::{DeviceKind, PowerError, PowerSystem};

/// Errors from spawning catalog devices.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("no device template named '{0}'")]
    UnknownTemplate(String),
    #[error(transparent)]
    Power(#[from] PowerError),
}

/// Device templates by name, remembering file order.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    templates: HashMap<String, DeviceKind>,
    order: Vec<String>,
}

impl DeviceCatalog {
    pub(crate) fn new(templates: HashMap<String, DeviceKind>, order: Vec<String>) -> Self {
        Self { templates, order }
    }

    pub fn get(&self, name: &str) -> Option<&DeviceKind> {
        self.templates.get(name)
    }

    /// Template names in the order they appeared in the data file.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Register a new device built from the named template.
    pub fn spawn(
        &self,
        system: &mut PowerSystem,
        name: &str,
        serial: DeviceSerial,
        location: Option<LocationId>,
    ) -> Result<DeviceId, SpawnError> {
        let kind = self
            .get(name)
            .ok_or_else(|| SpawnError::UnknownTemplate(name.to_string()))?;
        let id = system.add_device(kind.clone(), serial, location)?;
        tracing::trace!(template = name, ?id, "spawned device from template");
        Ok(id)
    }
}
