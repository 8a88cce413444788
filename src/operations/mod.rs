mod batch;
mod components;
mod enclosure;
mod fill;
mod morphology;
mod resolution;
mod sample;
mod voxelize;

pub use batch::{BatchParams, BatchReport, BatchVoxelize, Chunk, ChunkPlan};
pub use components::{
    label_components, ComponentLabels, ComponentReport, ComponentThreshold, FilterComponents,
    BACKGROUND,
};
pub use enclosure::Enclosure;
pub use fill::{FillInterior, FillParams, FillReport};
pub use morphology::{dilate, erode, Morphology, MorphologyOp, MorphologyParams, MorphologyReport};
pub use resolution::{EstimateResolution, GridSpec, ResolutionParams};
pub use sample::{SampleParams, SampleReport, SampleSurface};
pub use voxelize::{Voxelization, VoxelizationReport, Voxelize, VoxelizeParams};
