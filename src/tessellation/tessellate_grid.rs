use rayon::prelude::*;

use crate::error::{GridError, Result};
use crate::grid::Grid;
use crate::math::Vector3;

use super::TriangleMesh;

/// Outward direction and counter-clockwise corners (relative to the cell's
/// minimum corner, in voxels) of each cell face.
static FACES: [([i64; 3], [[u8; 3]; 4]); 6] = [
    ([1, 0, 0], [[1, 0, 0], [1, 1, 0], [1, 1, 1], [1, 0, 1]]),
    ([-1, 0, 0], [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]]),
    ([0, 1, 0], [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]]),
    ([0, -1, 0], [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 1]]),
    ([0, 0, 1], [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]]),
    ([0, 0, -1], [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]]),
];

/// Builds the blocky boundary mesh of a grid's solid cells.
///
/// Every solid cell face whose neighbour is non-solid (or outside the grid)
/// becomes two triangles with flat outward normals.
pub struct TessellateGrid<'a> {
    grid: &'a Grid,
}

impl<'a> TessellateGrid<'a> {
    /// Creates a new `TessellateGrid` operation.
    #[must_use]
    pub fn new(grid: &'a Grid) -> Self {
        Self { grid }
    }

    /// Executes the tessellation.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::MeshTooLarge`] if the mesh would need more
    /// vertices than `u32` indices can address.
    pub fn execute(&self) -> Result<TriangleMesh> {
        let [_, _, depth] = self.grid.dims();

        let faces: usize = (0..depth)
            .into_par_iter()
            .map(|z| {
                self.slice_cells(z)
                    .map(|cell| self.exposed(cell).count())
                    .sum::<usize>()
            })
            .sum();
        if faces.saturating_mul(4) > u32::MAX as usize {
            return Err(GridError::MeshTooLarge { faces }.into());
        }

        Ok((0..depth)
            .into_par_iter()
            .map(|z| self.tessellate_slice(z))
            .reduce(TriangleMesh::default, |mut acc, part| {
                acc.merge(&part);
                acc
            }))
    }

    fn slice_cells(&self, z: usize) -> impl Iterator<Item = [usize; 3]> + '_ {
        let [w, h, _] = self.grid.dims();
        (0..h).flat_map(move |y| (0..w).map(move |x| [x, y, z]))
    }

    /// Faces of `cell` that border non-solid space.
    #[allow(clippy::cast_possible_wrap)]
    fn exposed(&self, cell: [usize; 3]) -> impl Iterator<Item = &'static [[u8; 3]; 4]> + '_ {
        let solid = self.grid.get(cell).is_some_and(|s| s.is_solid());
        FACES.iter().filter_map(move |(dir, corners)| {
            if !solid {
                return None;
            }
            let next = std::array::from_fn(|i| cell[i] as i64 + dir[i]);
            let covered = self
                .grid
                .frame()
                .checked_cell(next)
                .and_then(|n| self.grid.get(n))
                .is_some_and(|s| s.is_solid());
            (!covered).then_some(corners)
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn tessellate_slice(&self, z: usize) -> TriangleMesh {
        let origin = self.grid.origin();
        let h = self.grid.voxel_size();

        let mut mesh = TriangleMesh::default();
        for cell in self.slice_cells(z) {
            for corners in self.exposed(cell) {
                let base = mesh.vertices.len() as u32;
                let quad = corners.map(|c| {
                    origin
                        + Vector3::new(
                            (cell[0] + usize::from(c[0])) as f64,
                            (cell[1] + usize::from(c[1])) as f64,
                            (cell[2] + usize::from(c[2])) as f64,
                        ) * h
                });
                let normal = (quad[1] - quad[0]).cross(&(quad[2] - quad[0])).normalize();
                mesh.vertices.extend_from_slice(&quad);
                mesh.normals.extend_from_slice(&[normal; 4]);
                mesh.indices.push([base, base + 1, base + 2]);
                mesh.indices.push([base, base + 2, base + 3]);
            }
        }
        mesh
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grid::VoxelState;
    use crate::math::Point3;
    use approx::assert_relative_eq;

    fn grid(dims: [usize; 3]) -> Grid {
        Grid::new(Point3::new(1.0, 2.0, 3.0), 0.5, dims).unwrap()
    }

    #[test]
    fn single_voxel_is_a_closed_cube() {
        let mut g = grid([3, 3, 3]);
        g.set([1, 1, 1], VoxelState::Interior);
        let mesh = TessellateGrid::new(&g).execute().unwrap();

        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.normals.len(), 24);

        let centre = g.cell_center([1, 1, 1]);
        for &[a, b, c] in &mesh.indices {
            let (a, b, c) = (
                mesh.vertices[a as usize],
                mesh.vertices[b as usize],
                mesh.vertices[c as usize],
            );
            let normal = (b - a).cross(&(c - a)).normalize();
            let face_centre = Point3::from((a.coords + b.coords + c.coords) / 3.0);
            assert!(normal.dot(&(face_centre - centre)) > 0.0, "inward face");
            assert_relative_eq!((face_centre - centre).dot(&normal), 0.25, epsilon = 1e-12);
        }
        let area: f64 = mesh.to_mesh().triangles().iter().map(|t| t.area()).sum();
        assert_relative_eq!(area, 6.0 * 0.25, epsilon = 1e-12);
    }

    #[test]
    fn shared_faces_are_hidden() {
        let mut g = grid([4, 3, 3]);
        g.set([1, 1, 1], VoxelState::Surface);
        g.set([2, 1, 1], VoxelState::Interior);
        let mesh = TessellateGrid::new(&g).execute().unwrap();
        assert_eq!(mesh.triangle_count(), 2 * 10);
    }

    #[test]
    fn grid_edge_faces_are_emitted() {
        let mut g = grid([1, 1, 1]);
        g.set([0, 0, 0], VoxelState::Surface);
        let mesh = TessellateGrid::new(&g).execute().unwrap();
        assert_eq!(mesh.triangle_count(), 12);
        let bounds = mesh.to_mesh().bounds().unwrap();
        assert_relative_eq!(bounds.min, Point3::new(1.0, 2.0, 3.0), epsilon = 1e-12);
        assert_relative_eq!(bounds.max, Point3::new(1.5, 2.5, 3.5), epsilon = 1e-12);
    }

    #[test]
    fn empty_and_exterior_cells_emit_nothing() {
        let mut g = grid([2, 2, 2]);
        g.set([0, 0, 0], VoxelState::Exterior);
        let mesh = TessellateGrid::new(&g).execute().unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn merge_offsets_indices() {
        let mut g = grid([3, 1, 1]);
        g.set([0, 0, 0], VoxelState::Surface);
        let one = TessellateGrid::new(&g).execute().unwrap();
        let mut two = one.clone();
        two.merge(&one);
        assert_eq!(two.triangle_count(), 24);
        assert_eq!(two.indices[12], [24, 25, 26]);
    }
}
