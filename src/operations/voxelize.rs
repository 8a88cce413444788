use tracing::{info, warn};

use crate::error::{Result, Warning};
use crate::grid::{Connectivity, Grid};
use crate::mesh::Mesh;

use super::batch::{BatchParams, BatchVoxelize};
use super::components::{ComponentReport, ComponentThreshold, FilterComponents};
use super::fill::{FillInterior, FillParams, FillReport};
use super::morphology::{Morphology, MorphologyParams, MorphologyReport};
use super::resolution::{EstimateResolution, GridSpec, ResolutionParams};
use super::sample::{SampleParams, SampleReport, SampleSurface};

/// Parameters for a full mesh-to-grid conversion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoxelizeParams {
    /// Grid resolution and padding.
    pub resolution: ResolutionParams,
    /// Surface sampling.
    pub sample: SampleParams,
    /// Interior fill and leak detection.
    pub fill: FillParams,
    /// Morphological cleanup.
    pub morphology: MorphologyParams,
    /// Size threshold of retained components.
    pub components: ComponentThreshold,
    /// Adjacency used when labelling components.
    pub component_connectivity: Connectivity,
    /// Chunking of large grids.
    pub batch: BatchParams,
}

impl VoxelizeParams {
    /// Params with a fixed voxel size and defaults elsewhere.
    #[must_use]
    pub fn with_voxel_size(voxel_size: f64) -> Self {
        Self {
            resolution: ResolutionParams::with_voxel_size(voxel_size),
            ..Self::default()
        }
    }

    /// Create params optimized for quick, coarse previews.
    ///
    /// Halves the base resolution and skips the leak check.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            resolution: ResolutionParams {
                base_resolution: 20,
                max_voxels: 64 * 64 * 64,
                ..ResolutionParams::default()
            },
            fill: FillParams {
                detect_leaks: false,
                ..FillParams::default()
            },
            ..Self::default()
        }
    }

    /// Create params optimized for detailed output.
    ///
    /// Doubles the base resolution and raises the voxel ceiling; large grids
    /// are processed in chunks.
    #[must_use]
    pub fn high_quality() -> Self {
        Self {
            resolution: ResolutionParams {
                base_resolution: 80,
                max_voxels: 512 * 512 * 512,
                ..ResolutionParams::default()
            },
            ..Self::default()
        }
    }
}

/// Per-stage record of a conversion job.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VoxelizationReport {
    /// Resolved grid placement.
    pub spec: GridSpec,
    /// Surface sampling totals.
    pub sample: SampleReport,
    /// Interior fill totals.
    pub fill: FillReport,
    /// Morphological cleanup totals.
    pub morphology: MorphologyReport,
    /// Component filtering totals.
    pub components: ComponentReport,
    /// Number of chunks, if the grid was processed in chunks.
    pub chunks: Option<usize>,
    /// Non-fatal diagnostics, in the order they were raised.
    pub warnings: Vec<Warning>,
}

impl VoxelizationReport {
    /// Returns `true` if sampling and fill ran chunk by chunk.
    #[must_use]
    pub fn chunked(&self) -> bool {
        self.chunks.is_some()
    }
}

/// A finished conversion: the grid and how it was produced.
#[derive(Debug, Clone)]
pub struct Voxelization {
    /// Final grid. Cells are `Empty`, `Surface` or `Interior`.
    pub grid: Grid,
    /// Stage-by-stage report.
    pub report: VoxelizationReport,
}

/// Converts a triangle mesh into a solid voxel grid.
///
/// Stages run strictly in order: resolution estimate, surface sampling,
/// interior fill (both chunked when the grid exceeds the memory budget),
/// morphological cleanup and component filtering.
pub struct Voxelize<'a> {
    mesh: &'a Mesh,
    params: VoxelizeParams,
}

impl<'a> Voxelize<'a> {
    /// Creates a new `Voxelize` operation.
    #[must_use]
    pub fn new(mesh: &'a Mesh, params: VoxelizeParams) -> Self {
        Self { mesh, params }
    }

    /// Executes the conversion.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is degenerate, the resolution cannot fit
    /// the voxel ceiling, or a chunk fails twice. No grid is returned on
    /// error.
    pub fn execute(&self) -> Result<Voxelization> {
        let params = &self.params;
        let spec = EstimateResolution::new(self.mesh, params.resolution).execute()?;
        let mut warnings: Vec<Warning> = spec.warning().into_iter().collect();

        let mut grid = spec.allocate();
        let (sample, fill, chunks) = if params.batch.needs_chunking(grid.len()) {
            // Chunks must overlap by at least the structuring element.
            let batch = BatchParams {
                overlap: params.batch.overlap.max(params.morphology.radius),
                ..params.batch
            };
            let report = BatchVoxelize::new(self.mesh, params.sample, params.fill, batch)
                .execute(&mut grid)?;
            (report.sample, report.fill, Some(report.chunks))
        } else {
            let sample = SampleSurface::new(self.mesh, params.sample).execute(&mut grid);
            let fill = FillInterior::new(params.fill)
                .with_mesh(self.mesh)
                .execute(&mut grid);
            (sample, fill, None)
        };

        if sample.degenerate_skipped > 0 {
            warnings.push(Warning::DegenerateTriangles {
                count: sample.degenerate_skipped,
            });
        }
        warnings.extend(fill.warning());

        grid.collapse_transient();
        let morphology = Morphology::new(params.morphology).execute(&mut grid);
        let components =
            FilterComponents::new(params.components, params.component_connectivity)
                .execute(&mut grid);

        if grid.solid_count() == 0 {
            warn!("Conversion produced an empty grid");
        }
        info!(
            dims = ?grid.dims(),
            voxel_size = grid.voxel_size(),
            solid = grid.solid_count(),
            chunks = chunks.unwrap_or(0),
            warnings = warnings.len(),
            "Voxelization complete"
        );

        Ok(Voxelization {
            grid,
            report: VoxelizationReport {
                spec,
                sample,
                fill,
                morphology,
                components,
                chunks,
                warnings,
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{MeshError, VoxelisError};
    use crate::grid::VoxelState;
    use crate::math::Point3;
    use crate::mesh::Triangle;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn tetrahedron(scale: f64) -> Mesh {
        let a = p(0.0, 0.0, 0.0);
        let b = p(scale, 0.0, 0.0);
        let c = p(0.0, scale, 0.0);
        let d = p(0.0, 0.0, scale);
        Mesh::new(vec![
            Triangle::new(a, c, b),
            Triangle::new(a, b, d),
            Triangle::new(a, d, c),
            Triangle::new(b, c, d),
        ])
    }

    #[test]
    fn tetrahedron_is_solid_and_clean() {
        let mesh = tetrahedron(1.0);
        let result = Voxelize::new(&mesh, VoxelizeParams::with_voxel_size(0.05))
            .execute()
            .unwrap();

        let grid = &result.grid;
        assert_eq!(grid.count(VoxelState::Exterior), 0);
        assert!(grid.count(VoxelState::Interior) > 0);
        assert!(result.report.warnings.is_empty());
        assert!(!result.report.chunked());
        assert_eq!(result.report.components.kept, 1);

        let inside = grid.cell_of_point(&p(0.2, 0.2, 0.2)).unwrap();
        assert_eq!(grid.get(inside), Some(VoxelState::Interior));
        let outside = grid.cell_of_point(&p(0.9, 0.9, 0.9)).unwrap();
        assert_eq!(grid.get(outside), Some(VoxelState::Empty));
    }

    #[test]
    fn degenerate_triangle_is_reported() {
        let mut triangles = tetrahedron(1.0).triangles().to_vec();
        triangles.push(Triangle::new(
            p(0.1, 0.1, 0.1),
            p(0.2, 0.2, 0.2),
            p(0.3, 0.3, 0.3),
        ));
        let mesh = Mesh::new(triangles);
        let result = Voxelize::new(&mesh, VoxelizeParams::with_voxel_size(0.1))
            .execute()
            .unwrap();
        assert!(result
            .report
            .warnings
            .contains(&Warning::DegenerateTriangles { count: 1 }));
    }

    #[test]
    fn empty_mesh_is_fatal() {
        let mesh = Mesh::new(Vec::new());
        let err = Voxelize::new(&mesh, VoxelizeParams::default())
            .execute()
            .unwrap_err();
        assert!(matches!(err, VoxelisError::Mesh(MeshError::Degenerate(_))));
    }

    #[test]
    fn over_budget_grid_is_chunked_with_same_result() {
        let mesh = tetrahedron(1.0);
        let params = VoxelizeParams::with_voxel_size(0.05);
        let whole = Voxelize::new(&mesh, params).execute().unwrap();

        let chunked_params = VoxelizeParams {
            batch: BatchParams {
                memory_budget: 1000,
                chunk_size: 8,
                ..BatchParams::default()
            },
            ..params
        };
        let chunked = Voxelize::new(&mesh, chunked_params).execute().unwrap();
        assert!(chunked.report.chunked());
        assert!(chunked.report.chunks.unwrap() > 1);
        assert_eq!(chunked.grid, whole.grid);
    }

    #[test]
    fn presets_differ_in_resolution() {
        let mesh = tetrahedron(1.0);
        let fast = Voxelize::new(&mesh, VoxelizeParams::fast()).execute().unwrap();
        let fine = Voxelize::new(&mesh, VoxelizeParams::high_quality())
            .execute()
            .unwrap();
        assert!(fast.grid.voxel_size() > fine.grid.voxel_size());
    }
}
