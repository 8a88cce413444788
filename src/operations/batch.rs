use tracing::{debug, info, warn};

use crate::error::{BatchError, Result};
use crate::grid::{CellRegion, Grid, VoxelState};
use crate::mesh::Mesh;

use super::fill::{fill_buffer, FillInterior, FillParams, FillReport};
use super::sample::{SampleParams, SampleReport, SampleSurface};

/// Attempts per chunk before the job is aborted.
const MAX_ATTEMPTS: u32 = 2;

/// Parameters controlling chunked processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchParams {
    /// Grids with more voxels than this are processed in chunks.
    pub memory_budget: usize,
    /// Edge length of a chunk's core, in voxels.
    pub chunk_size: usize,
    /// Cells added around each core, in voxels.
    pub overlap: usize,
    /// Chunk even when the grid fits the budget.
    pub force: bool,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self {
            memory_budget: 1 << 23,
            chunk_size: 64,
            overlap: 2,
            force: false,
        }
    }
}

impl BatchParams {
    /// Returns `true` if a grid of `voxels` cells should be chunked.
    #[must_use]
    pub fn needs_chunking(&self, voxels: usize) -> bool {
        self.force || voxels > self.memory_budget
    }
}

/// One unit of chunked work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the plan.
    pub id: usize,
    /// Cells this chunk is responsible for. Cores tile the grid exactly.
    pub core: CellRegion,
    /// The core grown by the overlap, clamped to the grid.
    pub region: CellRegion,
}

/// Partition of a grid into overlapping chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    chunks: Vec<Chunk>,
}

impl ChunkPlan {
    /// Tiles a grid of `dims` with cores of `chunk_size³`, each grown by
    /// `overlap` cells.
    #[must_use]
    pub fn new(dims: [usize; 3], chunk_size: usize, overlap: usize) -> Self {
        let size = chunk_size.max(1);
        let steps = |axis: usize| (0..dims[axis]).step_by(size);

        let mut chunks = Vec::new();
        for z in steps(2) {
            for y in steps(1) {
                for x in steps(0) {
                    let min = [x, y, z];
                    let max = std::array::from_fn(|i| (min[i] + size).min(dims[i]));
                    let core = CellRegion::new(min, max);
                    chunks.push(Chunk {
                        id: chunks.len(),
                        core,
                        region: core.expanded(overlap, dims),
                    });
                }
            }
        }
        Self { chunks }
    }

    /// The planned chunks, x fastest.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if the plan is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Largest buffer any chunk needs, in voxels.
    #[must_use]
    pub fn peak_chunk_voxels(&self) -> usize {
        self.chunks
            .iter()
            .map(|c| c.region.volume())
            .max()
            .unwrap_or(0)
    }
}

/// Outcome of a chunked run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchReport {
    /// Chunks processed.
    pub chunks: usize,
    /// Chunk attempts that failed and were retried.
    pub retries: usize,
    /// Surface sampling totals, as the unchunked pass would report them.
    pub sample: SampleReport,
    /// Interior fill totals, as the unchunked pass would report them.
    pub fill: FillReport,
}

/// Runs surface sampling and interior fill chunk by chunk.
///
/// Each chunk samples and fills its own buffer, treating the buffer's outer
/// layer as outside. Stitching keeps `Surface` from any chunk and `Interior`
/// from any chunk: a cell enclosed inside a chunk is enclosed in the whole
/// grid. A final whole-grid fill classifies what no chunk could, so the
/// result matches an unchunked pass cell for cell.
pub struct BatchVoxelize<'a> {
    mesh: &'a Mesh,
    sample: SampleParams,
    fill: FillParams,
    batch: BatchParams,
}

impl<'a> BatchVoxelize<'a> {
    /// Creates a new `BatchVoxelize` operation.
    #[must_use]
    pub fn new(
        mesh: &'a Mesh,
        sample: SampleParams,
        fill: FillParams,
        batch: BatchParams,
    ) -> Self {
        Self {
            mesh,
            sample,
            fill,
            batch,
        }
    }

    /// Executes the chunked pass on an all-`Empty` grid.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::ChunkFailed`] if a chunk fails twice. The grid
    /// is left partially written in that case and must be discarded.
    pub fn execute(&self, grid: &mut Grid) -> Result<BatchReport> {
        let frame = *grid.frame();
        let plan = ChunkPlan::new(frame.dims, self.batch.chunk_size, self.batch.overlap);
        info!(
            chunks = plan.len(),
            peak_chunk_voxels = plan.peak_chunk_voxels(),
            grid_voxels = frame.len(),
            "Processing grid in chunks"
        );

        let sampler = SampleSurface::new(self.mesh, self.sample);

        let mut retries = 0;
        for chunk in plan.chunks() {
            let (buffer, attempts) = with_retry(chunk.id, || {
                let mut buffer = allocate_chunk(chunk.id, chunk.region.volume())?;
                sampler.sample_into(&frame, chunk.region, &mut buffer, chunk.region);
                fill_buffer(&mut buffer, chunk.region);
                Ok(buffer)
            })?;
            retries += attempts as usize - 1;
            stitch(grid, chunk.region, &buffer);
            debug!(chunk = chunk.id, region = ?chunk.region, "Chunk stitched");
        }

        let surface_cells = grid.count(VoxelState::Surface);
        let mut fill = FillInterior::new(self.fill)
            .with_mesh(self.mesh)
            .execute(grid);
        fill.interior_cells = grid.count(VoxelState::Interior);

        let degenerate_skipped = self.mesh.degenerate_count();
        Ok(BatchReport {
            chunks: plan.len(),
            retries,
            sample: SampleReport {
                triangles_sampled: self.mesh.len() - degenerate_skipped,
                degenerate_skipped,
                surface_cells,
            },
            fill,
        })
    }
}

/// Allocates an all-`Empty` chunk buffer without aborting on exhaustion.
fn allocate_chunk(chunk: usize, voxels: usize) -> std::result::Result<Vec<VoxelState>, BatchError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(voxels)
        .map_err(|_| BatchError::ChunkAllocation { chunk, voxels })?;
    buffer.resize(voxels, VoxelState::Empty);
    Ok(buffer)
}

/// Runs `work` up to [`MAX_ATTEMPTS`] times, returning its output and the
/// number of attempts used.
fn with_retry<T, F>(chunk: usize, mut work: F) -> std::result::Result<(T, u32), BatchError>
where
    F: FnMut() -> std::result::Result<T, BatchError>,
{
    let mut attempt = 1;
    loop {
        match work() {
            Ok(value) => return Ok((value, attempt)),
            Err(err) if attempt < MAX_ATTEMPTS => {
                warn!(chunk, attempt, error = %err, "Chunk failed; retrying");
                attempt += 1;
            }
            Err(err) => {
                return Err(BatchError::ChunkFailed {
                    chunk,
                    attempts: attempt,
                    source: Box::new(err),
                })
            }
        }
    }
}

/// Merges a chunk buffer into the grid: `Surface` wins, then `Interior`;
/// `Exterior` is chunk-local and dropped.
fn stitch(grid: &mut Grid, region: CellRegion, buffer: &[VoxelState]) {
    for (cell, &state) in region.cells().zip(buffer) {
        let current = grid.get(cell);
        match state {
            VoxelState::Surface => grid.set(cell, VoxelState::Surface),
            VoxelState::Interior if current != Some(VoxelState::Surface) => {
                grid.set(cell, VoxelState::Interior);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::mesh::fixtures::box_mesh;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn unchunked(mesh: &Mesh, grid: &mut Grid) -> (SampleReport, FillReport) {
        let sample = SampleSurface::new(mesh, SampleParams::default()).execute(grid);
        let fill = FillInterior::new(FillParams::default())
            .with_mesh(mesh)
            .execute(grid);
        (sample, fill)
    }

    #[test]
    fn plan_cores_tile_the_grid() {
        let dims = [10, 7, 5];
        let plan = ChunkPlan::new(dims, 4, 1);
        assert_eq!(plan.len(), 3 * 2 * 2);

        let mut hits = vec![0u8; 10 * 7 * 5];
        for chunk in plan.chunks() {
            assert!(chunk.region.intersection(&chunk.core) == Some(chunk.core));
            for [x, y, z] in chunk.core.cells() {
                hits[x + 10 * (y + 7 * z)] += 1;
            }
        }
        assert!(hits.iter().all(|&h| h == 1));
        assert_eq!(plan.chunks()[0].region, CellRegion::new([0, 0, 0], [5, 5, 5]));
        assert_eq!(plan.peak_chunk_voxels(), 6 * 6 * 5);
    }

    #[test]
    fn chunked_matches_unchunked() {
        let mesh = box_mesh(p(0.0, 0.0, 0.0), p(1.0, 0.7, 0.9));
        let mut whole = Grid::new(p(-0.2, -0.2, -0.2), 0.1, [14, 11, 13]).unwrap();
        let (sample, fill) = unchunked(&mesh, &mut whole);

        for (chunk_size, overlap) in [(4, 0), (5, 1), (3, 2)] {
            let mut chunked = Grid::from_frame(*whole.frame());
            let batch = BatchParams {
                chunk_size,
                overlap,
                force: true,
                ..BatchParams::default()
            };
            let report =
                BatchVoxelize::new(&mesh, SampleParams::default(), FillParams::default(), batch)
                    .execute(&mut chunked)
                    .unwrap();
            assert_eq!(chunked.cells(), whole.cells(), "chunk size {chunk_size}");
            assert_eq!(report.sample, sample);
            assert_eq!(report.fill, fill);
            assert_eq!(report.retries, 0);
        }
    }

    #[test]
    fn chunked_interior_survives_chunk_without_surface() {
        // A chunk strictly inside the box sees no surface at all and
        // floods itself Exterior; the whole-grid pass must still fill it.
        let mesh = box_mesh(p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0));
        let mut grid = Grid::new(p(-0.2, -0.2, -0.2), 0.1, [24, 24, 24]).unwrap();
        let batch = BatchParams {
            chunk_size: 6,
            overlap: 1,
            force: true,
            ..BatchParams::default()
        };
        BatchVoxelize::new(&mesh, SampleParams::default(), FillParams::default(), batch)
            .execute(&mut grid)
            .unwrap();
        assert_eq!(grid.get([12, 12, 12]), Some(VoxelState::Interior));
    }

    #[test]
    fn retry_recovers_from_one_failure() {
        let mut calls = 0;
        let (value, attempts) = with_retry(3, || {
            calls += 1;
            if calls == 1 {
                Err(BatchError::ChunkAllocation { chunk: 3, voxels: 8 })
            } else {
                Ok(7)
            }
        })
        .unwrap();
        assert_eq!((value, attempts), (7, 2));
    }

    #[test]
    fn second_failure_aborts() {
        let err = with_retry::<(), _>(5, || {
            Err(BatchError::ChunkAllocation { chunk: 5, voxels: 8 })
        })
        .unwrap_err();
        assert!(matches!(
            err,
            BatchError::ChunkFailed {
                chunk: 5,
                attempts: 2,
                ..
            }
        ));
    }

    #[test]
    fn impossible_allocation_is_reported() {
        assert!(matches!(
            allocate_chunk(1, usize::MAX),
            Err(BatchError::ChunkAllocation { chunk: 1, .. })
        ));
        assert_eq!(allocate_chunk(0, 8).unwrap(), vec![VoxelState::Empty; 8]);
    }

    #[test]
    fn budget_decides_chunking() {
        let params = BatchParams {
            memory_budget: 100,
            ..BatchParams::default()
        };
        assert!(!params.needs_chunking(100));
        assert!(params.needs_chunking(101));
        let forced = BatchParams {
            force: true,
            ..params
        };
        assert!(forced.needs_chunking(1));
    }
}
