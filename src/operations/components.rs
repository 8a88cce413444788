use std::collections::VecDeque;

use tracing::debug;

use crate::grid::{Connectivity, Grid, VoxelState};

/// Label of a background (non-solid) cell.
pub const BACKGROUND: u32 = 0;

/// Connected-component labelling of a grid's solid cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentLabels {
    /// One label per cell in linear order; [`BACKGROUND`] for non-solid
    /// cells, `1..=sizes.len()` otherwise. Labels follow the linear order of
    /// each component's first cell.
    pub labels: Vec<u32>,
    /// Voxel count of each component; `sizes[k]` belongs to label `k + 1`.
    pub sizes: Vec<usize>,
}

impl ComponentLabels {
    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Returns `true` if the grid has no solid cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Size of the largest component, or zero.
    #[must_use]
    pub fn largest(&self) -> usize {
        self.sizes.iter().copied().max().unwrap_or(0)
    }

    /// Size of the component with the given label.
    #[must_use]
    pub fn size_of(&self, label: u32) -> Option<usize> {
        let k = usize::try_from(label).ok()?.checked_sub(1)?;
        self.sizes.get(k).copied()
    }
}

/// Labels every connected component of solid cells.
///
/// Iterative breadth-first search; cells are visited in linear order so the
/// labelling is deterministic.
#[must_use]
pub fn label_components(grid: &Grid, connectivity: Connectivity) -> ComponentLabels {
    let cells = grid.cells();
    let mut labels = vec![BACKGROUND; cells.len()];
    let mut sizes = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..cells.len() {
        if !cells[seed].is_solid() || labels[seed] != BACKGROUND {
            continue;
        }
        let Ok(label) = u32::try_from(sizes.len() + 1) else {
            break;
        };
        labels[seed] = label;
        queue.push_back(seed);
        let mut size = 0;

        while let Some(index) = queue.pop_front() {
            size += 1;
            for next in grid.neighbors(grid.coords(index), connectivity) {
                let n = grid.index(next);
                if cells[n].is_solid() && labels[n] == BACKGROUND {
                    labels[n] = label;
                    queue.push_back(n);
                }
            }
        }
        sizes.push(size);
    }

    ComponentLabels { labels, sizes }
}

/// Size threshold below which a component is discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentThreshold {
    /// Absolute minimum voxel count.
    pub min_voxels: usize,
    /// Minimum size relative to the largest component, in `[0, 1]`.
    /// The default of `1.0` keeps only the largest component(s).
    pub min_fraction_of_largest: f64,
}

impl Default for ComponentThreshold {
    fn default() -> Self {
        Self {
            min_voxels: 1,
            min_fraction_of_largest: 1.0,
        }
    }
}

impl ComponentThreshold {
    /// Keeps every component of at least `min_voxels` cells.
    #[must_use]
    pub fn absolute(min_voxels: usize) -> Self {
        Self {
            min_voxels,
            min_fraction_of_largest: 0.0,
        }
    }

    /// Keeps every component at least `fraction` of the largest.
    #[must_use]
    pub fn relative(fraction: f64) -> Self {
        Self {
            min_voxels: 1,
            min_fraction_of_largest: fraction,
        }
    }

    /// Returns `true` if a component of `size` voxels survives next to a
    /// largest component of `largest` voxels.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn keeps(&self, size: usize, largest: usize) -> bool {
        if size >= largest {
            return true;
        }
        let fraction = self.min_fraction_of_largest.clamp(0.0, 1.0);
        size >= self.min_voxels && size as f64 >= fraction * largest as f64
    }
}

/// Outcome of a component filtering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentReport {
    /// Components found before filtering.
    pub components: usize,
    /// Components retained.
    pub kept: usize,
    /// Components discarded.
    pub removed_components: usize,
    /// Voxels reverted to `Empty`.
    pub removed_voxels: usize,
}

/// Removes small disconnected clusters of solid voxels.
///
/// Components tied with the largest are always retained.
pub struct FilterComponents {
    threshold: ComponentThreshold,
    connectivity: Connectivity,
}

impl FilterComponents {
    /// Creates a new `FilterComponents` operation.
    #[must_use]
    pub fn new(threshold: ComponentThreshold, connectivity: Connectivity) -> Self {
        Self {
            threshold,
            connectivity,
        }
    }

    /// Executes the filter in place.
    pub fn execute(&self, grid: &mut Grid) -> ComponentReport {
        let ComponentLabels { labels, sizes } = label_components(grid, self.connectivity);
        let largest = sizes.iter().copied().max().unwrap_or(0);
        let keep: Vec<bool> = sizes
            .iter()
            .map(|&size| self.threshold.keeps(size, largest))
            .collect();

        let mut removed_voxels = 0;
        for (cell, &label) in grid.cells_mut().iter_mut().zip(&labels) {
            if label == BACKGROUND {
                continue;
            }
            if !keep[label as usize - 1] {
                *cell = VoxelState::Empty;
                removed_voxels += 1;
            }
        }

        let kept = keep.iter().filter(|&&k| k).count();
        let report = ComponentReport {
            components: sizes.len(),
            kept,
            removed_components: sizes.len() - kept,
            removed_voxels,
        };
        debug!(
            components = report.components,
            kept = report.kept,
            removed_voxels = report.removed_voxels,
            largest,
            "Filtered components"
        );
        report
    }
}
