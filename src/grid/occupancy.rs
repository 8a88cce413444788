use crate::math::Point3;

use super::{Grid, GridFrame, VoxelState};

/// Read-only occupancy snapshot handed to external exporters.
///
/// States are stored in the grid's linear order (x fastest, then y, then z).
/// `Surface` and `Interior` are kept distinct; `Exterior` never appears.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OccupancyGrid {
    /// Placement of the grid in world space.
    pub frame: GridFrame,
    /// One state per voxel.
    pub states: Vec<VoxelState>,
}

impl OccupancyGrid {
    /// Snapshots a grid, collapsing transient labels.
    #[must_use]
    pub fn from_grid(grid: &Grid) -> Self {
        let states = grid
            .cells()
            .iter()
            .map(|&s| match s {
                VoxelState::Exterior => VoxelState::Empty,
                other => other,
            })
            .collect();
        Self {
            frame: *grid.frame(),
            states,
        }
    }

    /// Cell counts along x, y and z.
    #[must_use]
    pub fn dims(&self) -> [usize; 3] {
        self.frame.dims
    }

    /// World position of the minimum corner.
    #[must_use]
    pub fn origin(&self) -> Point3 {
        self.frame.origin
    }

    /// Edge length of one voxel.
    #[must_use]
    pub fn voxel_size(&self) -> f64 {
        self.frame.voxel_size
    }

    /// State at `(x, y, z)`, or `None` outside the grid.
    #[must_use]
    pub fn state(&self, cell: [usize; 3]) -> Option<VoxelState> {
        (0..3)
            .all(|i| cell[i] < self.frame.dims[i])
            .then(|| self.states[self.frame.index(cell)])
    }

    /// Returns `true` if `(x, y, z)` is solid.
    #[must_use]
    pub fn is_solid(&self, cell: [usize; 3]) -> bool {
        self.state(cell).is_some_and(VoxelState::is_solid)
    }

    /// World position of a voxel centre.
    #[must_use]
    pub fn cell_center(&self, cell: [usize; 3]) -> Point3 {
        self.frame.cell_center(cell)
    }

    /// Boolean occupancy in linear order.
    #[must_use]
    pub fn solid_flags(&self) -> Vec<bool> {
        self.states.iter().map(|s| s.is_solid()).collect()
    }

    /// Number of solid voxels.
    #[must_use]
    pub fn solid_count(&self) -> usize {
        self.states.iter().filter(|s| s.is_solid()).count()
    }
}
