use thiserror::Error;

/// Top-level error type for the Voxelis engine.
#[derive(Debug, Error)]
pub enum VoxelisError {
    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Errors related to the input mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("degenerate mesh: {0}")]
    Degenerate(String),

    #[error("vertex index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}

/// Errors related to grid construction and addressing.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("voxel size must be positive and finite, got {0}")]
    InvalidVoxelSize(f64),

    #[error("grid dimension along axis {axis} is zero")]
    EmptyDimension { axis: usize },

    #[error("grid of {voxels} voxels cannot be addressed")]
    TooLarge { voxels: u128 },

    #[error("boundary mesh of {faces} faces exceeds 32-bit vertex indices")]
    MeshTooLarge { faces: usize },
}

/// Errors raised while choosing the grid resolution.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("grid of {voxels} voxels exceeds the ceiling of {max_voxels} even at the coarsest resolution")]
    Overflow { voxels: u128, max_voxels: usize },

    #[error("invalid resolution parameters: {0}")]
    InvalidParameters(String),
}

/// Errors raised by chunked batch processing.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to allocate {voxels} voxels for chunk {chunk}")]
    ChunkAllocation { chunk: usize, voxels: usize },

    #[error("chunk {chunk} failed after {attempts} attempts")]
    ChunkFailed {
        chunk: usize,
        attempts: u32,
        #[source]
        source: Box<BatchError>,
    },
}

/// Non-fatal diagnostics collected while a job runs.
///
/// A job that produces warnings still completes; the grid may be degraded.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Warning {
    /// Exterior space reached cells the mesh encloses.
    /// The surface has a gap and the affected region came out hollow.
    #[error("surface leaks: {leaked_cells} enclosed cells reached from outside")]
    LeakedSurface { leaked_cells: usize },

    /// The requested resolution exceeded the voxel ceiling and was coarsened.
    #[error("voxel size raised from {requested} to {actual} to fit the voxel ceiling")]
    ResolutionLowered { requested: f64, actual: f64 },

    /// Zero-area triangles were skipped by the surface sampler.
    #[error("{count} zero-area triangles skipped")]
    DegenerateTriangles { count: usize },
}

/// Convenience type alias for results using [`VoxelisError`].
pub type Result<T> = std::result::Result<T, VoxelisError>;
