use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::error::Warning;
use crate::grid::{CellRegion, Connectivity, Grid, VoxelState};
use crate::mesh::Mesh;

use super::enclosure::Enclosure;

/// Parameters controlling the interior fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FillParams {
    /// Check the flood against the mesh for leaks.
    pub detect_leaks: bool,
}

impl Default for FillParams {
    fn default() -> Self {
        Self { detect_leaks: true }
    }
}

/// Outcome of an interior fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FillReport {
    /// Cells labelled `Exterior` by the flood.
    pub exterior_cells: usize,
    /// Cells newly labelled `Interior`.
    pub interior_cells: usize,
    /// Exterior cells whose centre the mesh encloses.
    pub leaked_cells: usize,
}

impl FillReport {
    /// The leak diagnostic, if any enclosed cell was reached from outside.
    #[must_use]
    pub fn warning(&self) -> Option<Warning> {
        (self.leaked_cells > 0).then_some(Warning::LeakedSurface {
            leaked_cells: self.leaked_cells,
        })
    }
}

/// Classifies every `Empty` cell as `Exterior` or `Interior`.
///
/// Breadth-first flood over face-adjacent `Empty` cells, seeded from the
/// grid's outermost layer. Reached cells become `Exterior`; the rest are
/// enclosed by `Surface` and become `Interior`.
///
/// Given the source mesh, the flood is then checked against it: `Exterior`
/// cells whose centre the mesh encloses (see [`Enclosure`]) are leaked
/// cells, and mean the surface has a gap the flood slipped through.
pub struct FillInterior<'a> {
    params: FillParams,
    mesh: Option<&'a Mesh>,
}

impl<'a> FillInterior<'a> {
    /// Creates a new `FillInterior` operation.
    #[must_use]
    pub fn new(params: FillParams) -> Self {
        Self { params, mesh: None }
    }

    /// Checks the flood against `mesh` for leaks.
    #[must_use]
    pub fn with_mesh(mut self, mesh: &'a Mesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// Executes the fill in place.
    pub fn execute(&self, grid: &mut Grid) -> FillReport {
        let region = grid.region();
        let mut report = fill_buffer(grid.cells_mut(), region);
        if let Some(mesh) = self.mesh.filter(|_| self.params.detect_leaks) {
            report.leaked_cells = Enclosure::new(mesh, grid.frame()).count_leaked(grid);
        }
        debug!(
            exterior_cells = report.exterior_cells,
            interior_cells = report.interior_cells,
            leaked_cells = report.leaked_cells,
            "Interior filled"
        );
        if report.leaked_cells > 0 {
            warn!(
                leaked_cells = report.leaked_cells,
                "Surface has gaps; exterior reached enclosed cells"
            );
        }
        report
    }
}

/// Fills a dense buffer laid out over `region`, treating the region's
/// outermost layer as the outside.
pub(crate) fn fill_buffer(cells: &mut [VoxelState], region: CellRegion) -> FillReport {
    let dims = region.dims();
    let exterior_cells = flood_from_shell(dims, |i| {
        let claim = cells[i] == VoxelState::Empty;
        if claim {
            cells[i] = VoxelState::Exterior;
        }
        claim
    });

    let mut interior_cells = 0;
    for cell in cells.iter_mut() {
        if *cell == VoxelState::Empty {
            *cell = VoxelState::Interior;
            interior_cells += 1;
        }
    }

    FillReport {
        exterior_cells,
        interior_cells,
        leaked_cells: 0,
    }
}

/// Breadth-first flood over face-adjacent cells, seeded from the buffer's
/// outer layer. `claim` is called for each candidate cell and returns `true`
/// if the cell is passable and not yet reached, marking it reached.
fn flood_from_shell<C>(dims: [usize; 3], mut claim: C) -> usize
where
    C: FnMut(usize) -> bool,
{
    let shell = CellRegion::full(dims);
    let index = |[x, y, z]: [usize; 3]| x + dims[0] * (y + dims[1] * z);

    let mut queue = VecDeque::new();
    for cell in shell.cells().filter(|&c| shell.is_on_shell(c)) {
        if claim(index(cell)) {
            queue.push_back(cell);
        }
    }

    let mut reached = queue.len();
    while let Some(cell) = queue.pop_front() {
        for offset in Connectivity::Face.offsets() {
            let Some(next) = step(cell, *offset, dims) else {
                continue;
            };
            if claim(index(next)) {
                reached += 1;
                queue.push_back(next);
            }
        }
    }
    reached
}

#[inline]
fn step(cell: [usize; 3], offset: [i64; 3], dims: [usize; 3]) -> Option<[usize; 3]> {
    let mut out = [0usize; 3];
    for i in 0..3 {
        let c = cell[i].checked_add_signed(isize::try_from(offset[i]).ok()?)?;
        if c >= dims[i] {
            return None;
        }
        out[i] = c;
    }
    Some(out)
}
