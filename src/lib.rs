pub mod error;
pub mod grid;
pub mod math;
pub mod mesh;
pub mod operations;
pub mod tessellation;

pub use error::{Result, VoxelisError, Warning};
pub use grid::{Grid, OccupancyGrid, VoxelState};
pub use mesh::{Mesh, Triangle};
pub use operations::{Voxelization, Voxelize, VoxelizeParams};
