//! Commands submitted from outside the tick and the tick boundary that
//! applies them.

use gridline_core::fixed::{Fixed64, Joules, Watts};
use gridline_core::id::{DeviceId, GridId, LocationId};

use crate::system::{PowerError, PowerEvent, PowerSystem};

/// A deferred mutation of the power system.
#[derive(Debug, Clone, PartialEq)]
pub enum PowerCommand {
    SetGrid {
        device: DeviceId,
        grid: Option<GridId>,
    },
    BeginDrawdown {
        producer: DeviceId,
        consumer: DeviceId,
    },
    EndDrawdown {
        producer: DeviceId,
        consumer: DeviceId,
    },
    SetSwitchedOn {
        device: DeviceId,
        on: bool,
    },
    SetCapacity {
        device: DeviceId,
        capacity: Watts,
    },
    SetDemand {
        device: DeviceId,
        demand: Watts,
    },
    ChargeBattery {
        device: DeviceId,
        energy: Joules,
    },
    ExtendGrid {
        grid: GridId,
        location: LocationId,
    },
    DeleteGrid {
        grid: GridId,
    },
    DeleteDevice {
        device: DeviceId,
    },
}

impl PowerSystem {
    /// Apply one command immediately.
    pub fn apply_command(&mut self, command: PowerCommand) -> Result<(), PowerError> {
        match command {
            PowerCommand::SetGrid { device, grid } => self.set_grid(device, grid),
            PowerCommand::BeginDrawdown { producer, consumer } => {
                self.begin_drawdown(producer, consumer)
            }
            PowerCommand::EndDrawdown { producer, consumer } => {
                self.end_drawdown(producer, consumer)
            }
            PowerCommand::SetSwitchedOn { device, on } => self.set_switched_on(device, on),
            PowerCommand::SetCapacity { device, capacity } => self.set_capacity(device, capacity),
            PowerCommand::SetDemand { device, demand } => self.set_demand(device, demand),
            PowerCommand::ChargeBattery { device, energy } => self.charge_battery(device, energy),
            PowerCommand::ExtendGrid { grid, location } => {
                if !self.grids.contains_key(&grid) {
                    return Err(PowerError::UnknownGrid(grid));
                }
                self.extend_grid(grid, location);
                Ok(())
            }
            PowerCommand::DeleteGrid { grid } => {
                if self.delete_grid(grid) {
                    Ok(())
                } else {
                    Err(PowerError::UnknownGrid(grid))
                }
            }
            PowerCommand::DeleteDevice { device } => self.on_delete(device),
        }
    }

    /// Advance one tick.
    ///
    /// 1. Apply queued commands in submission order. Failures are logged and
    ///    skipped.
    /// 2. Drain producing batteries by `dt_seconds` of load.
    /// 3. Return every event emitted since the last drain.
    pub fn tick(&mut self, dt_seconds: Fixed64) -> Vec<PowerEvent> {
        let commands = self.commands.drain(self.tick);
        for command in commands {
            if let Err(err) = self.apply_command(command.clone()) {
                tracing::warn!(?command, %err, "power command failed");
            }
        }

        self.drain_batteries(dt_seconds);
        self.tick += 1;
        self.drain_events()
    }
}
