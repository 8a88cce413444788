//! Property-based tests for the grid passes.
//!
//! Random solid and surface masks on small grids; each property must hold
//! for every mask.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use voxelis::grid::{Connectivity, Grid, VoxelState};
use voxelis::math::Point3;
use voxelis::operations::{
    dilate, erode, ComponentThreshold, FillInterior, FillParams, FilterComponents, Morphology,
    MorphologyOp, MorphologyParams,
};

// =============================================================================
// Strategies
// =============================================================================

const N: usize = 7;

fn arb_connectivity() -> impl Strategy<Value = Connectivity> {
    prop_oneof![Just(Connectivity::Face), Just(Connectivity::Full)]
}

/// A grid whose cells are drawn from `states`.
fn arb_grid(states: &'static [VoxelState]) -> impl Strategy<Value = Grid> {
    prop::collection::vec(prop::sample::select(states), N * N * N).prop_map(|cells| {
        let mut grid = Grid::new(Point3::origin(), 1.0, [N, N, N]).unwrap();
        grid.cells_mut().copy_from_slice(&cells);
        grid
    })
}

fn arb_solid_grid() -> impl Strategy<Value = Grid> {
    arb_grid(&[
        VoxelState::Empty,
        VoxelState::Surface,
        VoxelState::Interior,
    ])
}

fn arb_surface_grid() -> impl Strategy<Value = Grid> {
    arb_grid(&[VoxelState::Empty, VoxelState::Surface])
}

// =============================================================================
// Morphology
// =============================================================================

proptest! {
    /// Opening never adds solid cells and never relabels survivors.
    #[test]
    fn opening_never_grows(
        grid in arb_solid_grid(),
        connectivity in arb_connectivity(),
        radius in 0usize..3,
    ) {
        let mut opened = grid.clone();
        let params = MorphologyParams { op: MorphologyOp::Open, connectivity, radius };
        let report = Morphology::new(params).execute(&mut opened);

        prop_assert_eq!(report.added, 0);
        for (before, after) in grid.cells().iter().zip(opened.cells()) {
            prop_assert!(*after == VoxelState::Empty || after == before);
        }
        prop_assert_eq!(grid.solid_count() - opened.solid_count(), report.removed);
    }

    /// Closing never removes solid cells.
    #[test]
    fn closing_never_shrinks(grid in arb_solid_grid(), connectivity in arb_connectivity()) {
        let mut closed = grid.clone();
        let params = MorphologyParams { op: MorphologyOp::Close, connectivity, radius: 1 };
        let report = Morphology::new(params).execute(&mut closed);

        prop_assert_eq!(report.removed, 0);
        for (before, after) in grid.cells().iter().zip(closed.cells()) {
            if before.is_solid() {
                prop_assert_eq!(before, after);
            }
        }
    }

    /// Erosion is contained in the mask, which is contained in the dilation.
    #[test]
    fn erosion_and_dilation_bracket_the_mask(
        grid in arb_solid_grid(),
        connectivity in arb_connectivity(),
    ) {
        let mask = grid.solid_mask();
        let dims = grid.dims();
        let eroded = erode(&mask, dims, connectivity, 1);
        let dilated = dilate(&mask, dims, connectivity, 1);
        for i in 0..mask.len() {
            prop_assert!(!eroded[i] || mask[i]);
            prop_assert!(!mask[i] || dilated[i]);
        }
    }
}

// =============================================================================
// Component filter
// =============================================================================

proptest! {
    /// Filtering twice gives the same grid as filtering once.
    #[test]
    fn component_filter_is_idempotent(
        grid in arb_solid_grid(),
        connectivity in arb_connectivity(),
        min_voxels in 1usize..6,
        fraction in 0.0f64..=1.0,
    ) {
        let threshold = ComponentThreshold { min_voxels, min_fraction_of_largest: fraction };
        let filter = FilterComponents::new(threshold, connectivity);

        let mut once = grid.clone();
        filter.execute(&mut once);
        let mut twice = once.clone();
        let report = filter.execute(&mut twice);

        prop_assert_eq!(report.removed_voxels, 0);
        prop_assert_eq!(once, twice);
    }

    /// The largest component always survives.
    #[test]
    fn largest_component_survives(grid in arb_solid_grid(), connectivity in arb_connectivity()) {
        let mut filtered = grid.clone();
        let report = FilterComponents::new(ComponentThreshold::default(), connectivity)
            .execute(&mut filtered);
        if grid.solid_count() > 0 {
            prop_assert!(report.kept >= 1);
            prop_assert!(filtered.solid_count() > 0);
        }
    }
}

// =============================================================================
// Interior fill
// =============================================================================

proptest! {
    /// Every `Empty` cell is classified and surface cells are untouched.
    #[test]
    fn fill_classifies_every_empty_cell(grid in arb_surface_grid(), detect_leaks in any::<bool>()) {
        let mut filled = grid.clone();
        let params = FillParams { detect_leaks };
        let report = FillInterior::new(params).execute(&mut filled);

        prop_assert_eq!(filled.count(VoxelState::Empty), 0);
        prop_assert_eq!(filled.count(VoxelState::Surface), grid.count(VoxelState::Surface));
        prop_assert_eq!(
            report.exterior_cells + report.interior_cells,
            grid.count(VoxelState::Empty)
        );
        for cell in filled.region().cells() {
            if filled.is_boundary(cell) && grid.get(cell) == Some(VoxelState::Empty) {
                prop_assert_eq!(filled.get(cell), Some(VoxelState::Exterior));
            }
        }
    }
}
