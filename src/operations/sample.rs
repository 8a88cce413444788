use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::grid::{CellRegion, Grid, GridFrame, VoxelState};
use crate::math::Vector3;
use crate::mesh::{Mesh, Triangle};

/// Parameters controlling surface sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleParams {
    /// A cell is `Surface` when its centre lies within this distance of a
    /// triangle, in voxel units. Half a voxel is the smallest radius for
    /// which no 6-connected path can slip through a closed surface.
    pub surface_radius: f64,
    /// Maximum spacing between sample points on a triangle, in voxel units.
    /// Values above 0.5 are clamped.
    pub sample_spacing: f64,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            surface_radius: 0.5,
            sample_spacing: 0.5,
        }
    }
}

/// Outcome of a sampling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleReport {
    /// Non-degenerate triangles that touched the sampled region.
    pub triangles_sampled: usize,
    /// Zero-area triangles skipped without error.
    pub degenerate_skipped: usize,
    /// Cells newly marked `Surface` by this pass.
    pub surface_cells: usize,
}

/// Marks every cell whose centre lies near the mesh surface as `Surface`.
///
/// Each triangle is covered by a lattice of sample points; the cells around
/// every sample become candidates and are confirmed with an exact
/// point-to-triangle distance test. Triangles are processed in parallel;
/// marking is idempotent, so the result does not depend on scheduling.
pub struct SampleSurface<'a> {
    mesh: &'a Mesh,
    params: SampleParams,
    region: Option<CellRegion>,
}

impl<'a> SampleSurface<'a> {
    /// Creates a new `SampleSurface` operation over the whole grid.
    #[must_use]
    pub fn new(mesh: &'a Mesh, params: SampleParams) -> Self {
        Self {
            mesh,
            params,
            region: None,
        }
    }

    /// Restricts marking to the cells of `region`.
    #[must_use]
    pub fn with_region(mut self, region: CellRegion) -> Self {
        self.region = Some(region);
        self
    }

    /// Executes the pass, marking cells of `grid` in place.
    pub fn execute(&self, grid: &mut Grid) -> SampleReport {
        let frame = *grid.frame();
        let full = frame.region();
        let region = match self.region {
            Some(r) => r.intersection(&full),
            None => Some(full),
        };
        let Some(region) = region else {
            return SampleReport::default();
        };

        let report = self.sample_into(&frame, region, grid.cells_mut(), full);
        if report.degenerate_skipped > 0 {
            warn!(
                count = report.degenerate_skipped,
                "Skipped zero-area triangles during surface sampling"
            );
        }
        report
    }

    /// Marks the surface cells of `region` into `buffer`, a dense buffer laid
    /// out over `buffer_region` (which must contain `region`).
    pub(crate) fn sample_into(
        &self,
        frame: &GridFrame,
        region: CellRegion,
        buffer: &mut [VoxelState],
        buffer_region: CellRegion,
    ) -> SampleReport {
        let h = frame.voxel_size;
        let radius = self.params.surface_radius.max(0.0) * h;
        let spacing = self.params.sample_spacing.clamp(f64::EPSILON, 0.5) * h;
        let sampler = TriangleSampler {
            frame,
            region,
            radius,
            // Cell centres that sit exactly on the radius (a face halfway
            // between two rows of centres) must be captured on both sides.
            radius_sq: (radius * (1.0 + 1e-9)).powi(2),
            spacing,
            reach: reach_in_cells(radius + spacing, h),
        };

        let degenerate_skipped = self.mesh.degenerate_count();
        let marks = CellMarks::new(region);
        let triangles_sampled = self
            .mesh
            .triangles()
            .par_iter()
            .filter(|t| !t.is_degenerate() && sampler.touches_region(t))
            .inspect(|t| sampler.mark(t, &marks))
            .count();

        let mut surface_cells = 0;
        for (local, cell) in region.cells().enumerate() {
            if !marks.is_set(local) {
                continue;
            }
            let index = buffer_region.local_index(cell);
            if buffer[index] != VoxelState::Surface {
                buffer[index] = VoxelState::Surface;
                surface_cells += 1;
            }
        }

        debug!(
            triangles_sampled,
            surface_cells,
            region = ?region,
            "Surface sampled"
        );

        SampleReport {
            triangles_sampled,
            degenerate_skipped,
            surface_cells,
        }
    }
}

/// Neighbourhood half-width, in cells, guaranteed to contain every cell
/// centre within `distance` of a point in the base cell.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn reach_in_cells(distance: f64, voxel_size: f64) -> i64 {
    (distance / voxel_size + 0.5).ceil().max(1.0) as i64
}

/// One bit per cell of a region, set concurrently.
struct CellMarks {
    region: CellRegion,
    words: Vec<AtomicU64>,
}

impl CellMarks {
    fn new(region: CellRegion) -> Self {
        Self {
            region,
            words: (0..region.volume().div_ceil(64))
                .map(|_| AtomicU64::new(0))
                .collect(),
        }
    }

    fn set(&self, cell: [usize; 3]) {
        let local = self.region.local_index(cell);
        self.words[local / 64].fetch_or(1 << (local % 64), Ordering::Relaxed);
    }

    fn is_set(&self, local: usize) -> bool {
        self.words[local / 64].load(Ordering::Relaxed) & (1 << (local % 64)) != 0
    }
}

struct TriangleSampler<'f> {
    frame: &'f GridFrame,
    region: CellRegion,
    radius: f64,
    radius_sq: f64,
    spacing: f64,
    reach: i64,
}

impl TriangleSampler<'_> {
    /// Conservative test of whether any cell centre within `radius` of the
    /// triangle can lie inside the region.
    #[allow(clippy::cast_possible_wrap)]
    fn touches_region(&self, triangle: &Triangle) -> bool {
        let aabb = triangle.aabb().expanded(self.radius);
        let lo = self.frame.cell_of_point_unclamped(&aabb.min);
        let hi = self.frame.cell_of_point_unclamped(&aabb.max);
        (0..3).all(|i| {
            hi[i] + 1 >= self.region.min[i] as i64 && lo[i] - 1 < self.region.max[i] as i64
        })
    }

    /// Marks every region cell within `radius` of the triangle.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn mark(&self, triangle: &Triangle, marks: &CellMarks) {
        let [a, b, c] = triangle.vertices;
        let ab = b - a;
        let ac = c - a;

        // Lattice of n² congruent sub-triangles with edges no longer than the
        // spacing, so every point of the triangle is within `spacing` of a
        // sample.
        let n = (triangle.max_edge_length() / self.spacing).ceil().max(1.0) as usize;

        let mut bases: Vec<[i64; 3]> = Vec::new();
        for i in 0..=n {
            for j in 0..=(n - i) {
                let u = i as f64 / n as f64;
                let v = j as f64 / n as f64;
                let sample = a + ab * u + ac * v;
                bases.push(self.frame.cell_of_point_unclamped(&sample));
            }
        }
        bases.sort_unstable();
        bases.dedup();

        let mut candidates: Vec<[usize; 3]> = Vec::new();
        let r = self.reach;
        for base in &bases {
            for dz in -r..=r {
                for dy in -r..=r {
                    for dx in -r..=r {
                        let cell = [base[0] + dx, base[1] + dy, base[2] + dz];
                        if let Some(cell) = self.frame.checked_cell(cell) {
                            if self.region.contains(cell) {
                                candidates.push(cell);
                            }
                        }
                    }
                }
            }
        }
        candidates.sort_unstable();
        candidates.dedup();

        for cell in candidates {
            let center = self.frame.cell_center(cell);
            let offset: Vector3 = center - triangle.closest_point(&center);
            if offset.norm_squared() <= self.radius_sq {
                marks.set(cell);
            }
        }
    }
}
