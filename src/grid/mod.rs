//! Dense voxel grid and its addressing.

pub mod connectivity;
pub mod occupancy;
pub mod region;

pub use connectivity::Connectivity;
pub use occupancy::OccupancyGrid;
pub use region::CellRegion;

use crate::error::GridError;
use crate::math::{Point3, Vector3};

/// Classification of a single voxel.
///
/// `Surface` and `Interior` are solid. `Exterior` is a transient flood-fill
/// label and collapses to `Empty` before the grid is handed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum VoxelState {
    #[default]
    Empty = 0,
    Surface = 1,
    Interior = 2,
    Exterior = 3,
}

impl VoxelState {
    /// Returns `true` for `Surface` and `Interior`.
    #[must_use]
    pub fn is_solid(self) -> bool {
        matches!(self, Self::Surface | Self::Interior)
    }
}

/// Placement of a grid in world space: origin, voxel size and dimensions.
///
/// Everything that maps between cell coordinates and world coordinates goes
/// through the frame, so chunked and whole-grid passes compute bit-identical
/// cell centres.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridFrame {
    /// World position of the minimum corner of cell `(0, 0, 0)`.
    pub origin: Point3,
    /// Edge length of one voxel.
    pub voxel_size: f64,
    /// Cell counts along x, y and z.
    pub dims: [usize; 3],
}

impl GridFrame {
    /// Creates a frame, validating the voxel size and dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidVoxelSize`] for a non-positive or
    /// non-finite voxel size, [`GridError::EmptyDimension`] if any dimension
    /// is zero, and [`GridError::TooLarge`] if the voxel count overflows.
    pub fn new(origin: Point3, voxel_size: f64, dims: [usize; 3]) -> Result<Self, GridError> {
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(GridError::InvalidVoxelSize(voxel_size));
        }
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(GridError::EmptyDimension { axis });
        }
        dims.iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or(GridError::TooLarge {
                voxels: dims.iter().map(|&d| d as u128).product(),
            })?;
        Ok(Self {
            origin,
            voxel_size,
            dims,
        })
    }

    /// Total number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    /// Always `false`; a valid frame has at least one cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear index of a cell (x fastest, then y, then z).
    #[inline]
    #[must_use]
    pub fn index(&self, [x, y, z]: [usize; 3]) -> usize {
        x + self.dims[0] * (y + self.dims[1] * z)
    }

    /// Cell coordinates of a linear index.
    #[inline]
    #[must_use]
    pub fn coords(&self, index: usize) -> [usize; 3] {
        let x = index % self.dims[0];
        let rest = index / self.dims[0];
        [x, rest % self.dims[1], rest / self.dims[1]]
    }

    /// World position of a cell centre.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_center(&self, [x, y, z]: [usize; 3]) -> Point3 {
        let h = self.voxel_size;
        self.origin + Vector3::new((x as f64 + 0.5) * h, (y as f64 + 0.5) * h, (z as f64 + 0.5) * h)
    }

    /// Signed cell coordinates containing a world point; may lie outside the
    /// grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn cell_of_point_unclamped(&self, point: &Point3) -> [i64; 3] {
        let local = (point - self.origin) / self.voxel_size;
        // Saturating float-to-int casts keep far-away points well defined.
        std::array::from_fn(|i| local[i].floor() as i64)
    }

    /// Cell containing a world point, or `None` if it lies outside the grid.
    #[must_use]
    pub fn cell_of_point(&self, point: &Point3) -> Option<[usize; 3]> {
        self.checked_cell(self.cell_of_point_unclamped(point))
    }

    /// Converts signed coordinates to a cell if they are inside the grid.
    #[inline]
    #[must_use]
    pub fn checked_cell(&self, cell: [i64; 3]) -> Option<[usize; 3]> {
        let mut out = [0usize; 3];
        for i in 0..3 {
            let c = usize::try_from(cell[i]).ok()?;
            if c >= self.dims[i] {
                return None;
            }
            out[i] = c;
        }
        Some(out)
    }

    /// Returns `true` if the cell lies on the outermost layer of the grid.
    #[must_use]
    pub fn is_boundary(&self, cell: [usize; 3]) -> bool {
        (0..3).any(|i| cell[i] == 0 || cell[i] + 1 == self.dims[i])
    }

    /// The region covering the whole grid.
    #[must_use]
    pub fn region(&self) -> CellRegion {
        CellRegion::full(self.dims)
    }

    /// Neighbours of a cell that lie inside the grid.
    #[allow(clippy::cast_possible_wrap)]
    pub fn neighbors(
        &self,
        cell: [usize; 3],
        connectivity: Connectivity,
    ) -> impl Iterator<Item = [usize; 3]> + '_ {
        connectivity.offsets().iter().filter_map(move |o| {
            self.checked_cell(std::array::from_fn(|i| cell[i] as i64 + o[i]))
        })
    }
}

/// A dense three-dimensional array of [`VoxelState`] placed in world space.
///
/// Allocated once per job, mutated in place by each stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    frame: GridFrame,
    cells: Vec<VoxelState>,
}

impl Grid {
    /// Allocates a grid with every cell `Empty`.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame parameters are invalid.
    pub fn new(origin: Point3, voxel_size: f64, dims: [usize; 3]) -> Result<Self, GridError> {
        Ok(Self::from_frame(GridFrame::new(origin, voxel_size, dims)?))
    }

    /// Allocates an all-`Empty` grid over an existing frame.
    #[must_use]
    pub fn from_frame(frame: GridFrame) -> Self {
        Self {
            cells: vec![VoxelState::Empty; frame.len()],
            frame,
        }
    }

    /// The grid's placement in world space.
    #[must_use]
    pub fn frame(&self) -> &GridFrame {
        &self.frame
    }

    /// Cell counts along x, y and z.
    #[must_use]
    pub fn dims(&self) -> [usize; 3] {
        self.frame.dims
    }

    /// World position of the grid's minimum corner.
    #[must_use]
    pub fn origin(&self) -> Point3 {
        self.frame.origin
    }

    /// Edge length of one voxel.
    #[must_use]
    pub fn voxel_size(&self) -> f64 {
        self.frame.voxel_size
    }

    /// Total number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always `false`; a grid has at least one cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Linear index of a cell.
    #[inline]
    #[must_use]
    pub fn index(&self, cell: [usize; 3]) -> usize {
        self.frame.index(cell)
    }

    /// Cell coordinates of a linear index.
    #[inline]
    #[must_use]
    pub fn coords(&self, index: usize) -> [usize; 3] {
        self.frame.coords(index)
    }

    /// State of a cell, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, cell: [usize; 3]) -> Option<VoxelState> {
        (0..3)
            .all(|i| cell[i] < self.frame.dims[i])
            .then(|| self.cells[self.index(cell)])
    }

    /// Sets the state of a cell. Cells outside the grid are ignored.
    pub fn set(&mut self, cell: [usize; 3], state: VoxelState) {
        if (0..3).all(|i| cell[i] < self.frame.dims[i]) {
            let idx = self.index(cell);
            self.cells[idx] = state;
        }
    }

    /// All cells in linear-index order.
    #[must_use]
    pub fn cells(&self) -> &[VoxelState] {
        &self.cells
    }

    /// Mutable access to all cells in linear-index order.
    pub fn cells_mut(&mut self) -> &mut [VoxelState] {
        &mut self.cells
    }

    /// World position of a cell centre.
    #[must_use]
    pub fn cell_center(&self, cell: [usize; 3]) -> Point3 {
        self.frame.cell_center(cell)
    }

    /// Cell containing a world point, or `None` outside the grid.
    #[must_use]
    pub fn cell_of_point(&self, point: &Point3) -> Option<[usize; 3]> {
        self.frame.cell_of_point(point)
    }

    /// Returns `true` if the cell lies on the grid's outermost layer.
    #[must_use]
    pub fn is_boundary(&self, cell: [usize; 3]) -> bool {
        self.frame.is_boundary(cell)
    }

    /// Neighbours of a cell that lie inside the grid.
    pub fn neighbors(
        &self,
        cell: [usize; 3],
        connectivity: Connectivity,
    ) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.frame.neighbors(cell, connectivity)
    }

    /// Number of cells in the given state.
    #[must_use]
    pub fn count(&self, state: VoxelState) -> usize {
        self.cells.iter().filter(|&&s| s == state).count()
    }

    /// Number of solid cells.
    #[must_use]
    pub fn solid_count(&self) -> usize {
        self.cells.iter().filter(|s| s.is_solid()).count()
    }

    /// One flag per cell, `true` where the cell is solid.
    #[must_use]
    pub fn solid_mask(&self) -> Vec<bool> {
        self.cells.iter().map(|s| s.is_solid()).collect()
    }

    /// Collapses the transient `Exterior` label back to `Empty`.
    pub fn collapse_transient(&mut self) {
        for cell in &mut self.cells {
            if *cell == VoxelState::Exterior {
                *cell = VoxelState::Empty;
            }
        }
    }

    /// The region covering the whole grid.
    #[must_use]
    pub fn region(&self) -> CellRegion {
        self.frame.region()
    }

    /// Read-only snapshot for an external exporter.
    ///
    /// Transient labels are collapsed in the snapshot; the grid itself is
    /// left untouched.
    #[must_use]
    pub fn to_occupancy(&self) -> OccupancyGrid {
        OccupancyGrid::from_grid(self)
    }
}
