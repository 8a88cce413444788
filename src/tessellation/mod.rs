mod tessellate_grid;

pub use tessellate_grid::TessellateGrid;

use crate::math::{Point3, Vector3};
use crate::mesh::{Mesh, Triangle};

/// An indexed triangle mesh with per-vertex normals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3>,
    /// Vertex normals.
    pub normals: Vec<Vector3>,
    /// Triangle indices (each triple defines a triangle).
    pub indices: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if the mesh has no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Appends another mesh, offsetting its indices.
    ///
    /// The combined vertex count must fit in `u32`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn merge(&mut self, other: &Self) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.indices
            .extend(other.indices.iter().map(|tri| tri.map(|i| i + offset)));
    }

    /// Converts to the triangle soup accepted by the voxelizer.
    #[must_use]
    pub fn to_mesh(&self) -> Mesh {
        self.indices
            .iter()
            .map(|&[a, b, c]| {
                Triangle::new(
                    self.vertices[a as usize],
                    self.vertices[b as usize],
                    self.vertices[c as usize],
                )
            })
            .collect()
    }
}
