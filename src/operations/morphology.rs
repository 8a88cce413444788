use rayon::prelude::*;
use tracing::debug;

use crate::grid::{Connectivity, Grid, VoxelState};

/// Which morphological operation to apply to the solid mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MorphologyOp {
    /// Erosion then dilation. Removes thin protrusions, never grows the shape.
    #[default]
    Open,
    /// Dilation then erosion. Bridges narrow gaps, never shrinks the shape.
    Close,
}

/// Parameters controlling morphological cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MorphologyParams {
    /// Operation to apply.
    pub op: MorphologyOp,
    /// Shape of the structuring element.
    pub connectivity: Connectivity,
    /// Radius of the structuring element in voxels. Zero disables cleanup.
    pub radius: usize,
}

impl Default for MorphologyParams {
    fn default() -> Self {
        Self {
            op: MorphologyOp::Open,
            connectivity: Connectivity::Full,
            radius: 1,
        }
    }
}

impl MorphologyParams {
    /// Cleanup switched off.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            op: MorphologyOp::Open,
            connectivity: Connectivity::Full,
            radius: 0,
        }
    }
}

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MorphologyReport {
    /// Solid cells reverted to `Empty`.
    pub removed: usize,
    /// Cells added to the solid mask (closing only).
    pub added: usize,
    /// `Interior` cells relabelled `Surface` because opening exposed them.
    pub resurfaced: usize,
}

/// Binary opening (or closing) of the solid mask.
///
/// Removed cells become `Empty` and cells added by closing become `Surface`.
/// Surviving cells keep their state, except that after an opening any
/// `Interior` cell left with a non-solid face neighbour becomes `Surface`.
pub struct Morphology {
    params: MorphologyParams,
}

impl Morphology {
    /// Creates a new `Morphology` operation.
    #[must_use]
    pub fn new(params: MorphologyParams) -> Self {
        Self { params }
    }

    /// Executes the pass in place.
    pub fn execute(&self, grid: &mut Grid) -> MorphologyReport {
        let MorphologyParams {
            op,
            connectivity,
            radius,
        } = self.params;
        if radius == 0 {
            return MorphologyReport::default();
        }

        let dims = grid.dims();
        let mask = grid.solid_mask();
        let result = match op {
            MorphologyOp::Open => {
                let eroded = erode(&mask, dims, connectivity, radius);
                dilate(&eroded, dims, connectivity, radius)
            }
            MorphologyOp::Close => {
                let dilated = dilate(&mask, dims, connectivity, radius);
                erode(&dilated, dims, connectivity, radius)
            }
        };

        let mut report = MorphologyReport::default();
        for ((cell, &before), &after) in grid.cells_mut().iter_mut().zip(&mask).zip(&result) {
            match (before, after) {
                (true, false) if op == MorphologyOp::Open => {
                    *cell = VoxelState::Empty;
                    report.removed += 1;
                }
                (false, true) if op == MorphologyOp::Close => {
                    *cell = VoxelState::Surface;
                    report.added += 1;
                }
                _ => {}
            }
        }

        if op == MorphologyOp::Open && report.removed > 0 {
            report.resurfaced = resurface(grid, &result);
        }

        debug!(
            ?op,
            radius,
            removed = report.removed,
            added = report.added,
            resurfaced = report.resurfaced,
            "Morphological cleanup"
        );
        report
    }
}

/// Relabels `Interior` cells with a face neighbour outside `solid` (or
/// outside the grid) as `Surface`.
fn resurface(grid: &mut Grid, solid: &[bool]) -> usize {
    let dims = grid.dims();
    let exposed = |cell: [usize; 3]| {
        Connectivity::Face.offsets().iter().any(|o| {
            !offset_cell(cell, *o, dims).is_some_and(|n| solid[linear(n, dims)])
        })
    };

    let mut resurfaced = 0;
    for (index, state) in grid.cells_mut().iter_mut().enumerate() {
        let cell = [
            index % dims[0],
            (index / dims[0]) % dims[1],
            index / (dims[0] * dims[1]),
        ];
        if *state == VoxelState::Interior && exposed(cell) {
            *state = VoxelState::Surface;
            resurfaced += 1;
        }
    }
    resurfaced
}

/// Binary erosion: a cell survives if every cell of the structuring element
/// centred on it is set. Cells outside the grid count as unset.
#[must_use]
pub fn erode(
    mask: &[bool],
    dims: [usize; 3],
    connectivity: Connectivity,
    radius: usize,
) -> Vec<bool> {
    let offsets = connectivity.ball_offsets(radius);
    apply(mask, dims, |cell| {
        mask[linear(cell, dims)]
            && offsets
                .iter()
                .all(|o| offset_cell(cell, *o, dims).is_some_and(|n| mask[linear(n, dims)]))
    })
}

/// Binary dilation: a cell is set if any cell of the structuring element
/// centred on it is set.
#[must_use]
pub fn dilate(
    mask: &[bool],
    dims: [usize; 3],
    connectivity: Connectivity,
    radius: usize,
) -> Vec<bool> {
    let offsets = connectivity.ball_offsets(radius);
    apply(mask, dims, |cell| {
        mask[linear(cell, dims)]
            || offsets
                .iter()
                .any(|o| offset_cell(cell, *o, dims).is_some_and(|n| mask[linear(n, dims)]))
    })
}

/// Evaluates `f` for every cell, one z-slice per task, reading only from
/// the immutable source mask.
fn apply<F>(mask: &[bool], dims: [usize; 3], f: F) -> Vec<bool>
where
    F: Fn([usize; 3]) -> bool + Sync,
{
    debug_assert_eq!(mask.len(), dims.iter().product::<usize>());
    let slice = dims[0] * dims[1];
    let mut out = vec![false; mask.len()];
    out.par_chunks_mut(slice.max(1))
        .enumerate()
        .for_each(|(z, plane)| {
            for (i, value) in plane.iter_mut().enumerate() {
                *value = f([i % dims[0], i / dims[0], z]);
            }
        });
    out
}

#[inline]
fn linear([x, y, z]: [usize; 3], dims: [usize; 3]) -> usize {
    x + dims[0] * (y + dims[1] * z)
}

#[inline]
fn offset_cell(cell: [usize; 3], offset: [i64; 3], dims: [usize; 3]) -> Option<[usize; 3]> {
    let mut out = [0usize; 3];
    for i in 0..3 {
        let c = i64::try_from(cell[i]).ok()? + offset[i];
        let c = usize::try_from(c).ok()?;
        if c >= dims[i] {
            return None;
        }
        out[i] = c;
    }
    Some(out)
}
