//! Grid connection as a single optional field: the adapter hosts use to
//! read or change which grid a device is on.

use gridline_core::id::{DeviceId, GridId};

use crate::device::Link;
use crate::system::{PowerError, PowerSystem};

impl PowerSystem {
    /// The grid a device is currently attached to, if any.
    pub fn grid_of(&self, device: DeviceId) -> Option<GridId> {
        match self.link_of(device) {
            Link::Grid(grid) => Some(grid),
            Link::None | Link::Producer(_) => None,
        }
    }

    /// Move a device to `grid`, or off any grid with `None`.
    ///
    /// Leaves the old grid, then joins the new one. Setting the grid the
    /// device is already on is a no-op. The target is checked before
    /// anything changes, so an unknown grid leaves the device where it was.
    pub fn set_grid(&mut self, device: DeviceId, grid: Option<GridId>) -> Result<(), PowerError> {
        self.grid_role_of(device)?;
        let current = self.grid_of(device);
        if current == grid {
            return Ok(());
        }
        if let Some(target) = grid {
            if !self.grids.contains_key(&target) {
                return Err(PowerError::UnknownGrid(target));
            }
        }

        if current.is_some() {
            self.leave_grid(device)?;
        }
        if let Some(target) = grid {
            self.join_grid(device, target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn set_grid_moves_between_grids() {
        let mut sys = PowerSystem::new();
        let first = sys.create_grid(None);
        let second = sys.create_grid(None);
        let g1 = add_generator(&mut sys, 10.0, true);
        let g2 = add_generator(&mut sys, 10.0, true);
        let lamp = add_appliance(&mut sys, 5.0);
        sys.set_grid(g1, Some(first)).unwrap();
        sys.set_grid(g2, Some(second)).unwrap();
        sys.set_grid(lamp, Some(first)).unwrap();
        sys.drain_events();

        sys.set_grid(lamp, Some(second)).unwrap();

        assert_eq!(sys.grid_of(lamp), Some(second));
        assert!(sys.is_powered(lamp));
        assert!(!sys.grid(first).unwrap().contains(lamp));
        let events = sys.drain_events();
        assert_eq!(removals(&events, lamp), 1);
        assert_eq!(arrivals(&events, lamp), 1);
    }

    #[test]
    fn set_same_grid_is_noop() {
        let mut sys = PowerSystem::new();
        let grid = sys.create_grid(None);
        let generator = add_generator(&mut sys, 10.0, true);
        let lamp = add_appliance(&mut sys, 5.0);
        sys.set_grid(generator, Some(grid)).unwrap();
        sys.set_grid(lamp, Some(grid)).unwrap();
        sys.drain_events();

        sys.set_grid(lamp, Some(grid)).unwrap();
        assert!(sys.drain_events().is_empty());
    }

    #[test]
    fn set_none_detaches() {
        let mut sys = PowerSystem::new();
        let grid = sys.create_grid(None);
        let lamp = add_appliance(&mut sys, 5.0);
        sys.set_grid(lamp, Some(grid)).unwrap();
        sys.set_grid(lamp, None).unwrap();
        assert_eq!(sys.grid_of(lamp), None);
        assert!(sys.grid(grid).unwrap().consumers().is_empty());
    }

    #[test]
    fn unknown_target_leaves_device_in_place() {
        let mut sys = PowerSystem::new();
        let grid = sys.create_grid(None);
        let lamp = add_appliance(&mut sys, 5.0);
        sys.set_grid(lamp, Some(grid)).unwrap();
        assert_eq!(
            sys.set_grid(lamp, Some(GridId(77))),
            Err(PowerError::UnknownGrid(GridId(77)))
        );
        assert_eq!(sys.grid_of(lamp), Some(grid));
    }
}
