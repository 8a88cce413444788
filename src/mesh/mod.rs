//! Immutable triangle-soup input to the voxelizer.

use crate::error::MeshError;
use crate::math::triangle_3d::{
    closest_point_on_triangle, triangle_area, triangle_cross, triangle_normal,
};
use crate::math::{Aabb, Point3, Vector3, TOLERANCE};

/// A single triangle given by its three corner positions.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Triangle {
    /// Corner positions in counter-clockwise order when seen from outside.
    pub vertices: [Point3; 3],
}

impl Triangle {
    /// Creates a triangle from three corners.
    #[must_use]
    pub fn new(a: Point3, b: Point3, c: Point3) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    /// Surface area.
    #[must_use]
    pub fn area(&self) -> f64 {
        let [a, b, c] = &self.vertices;
        triangle_area(a, b, c)
    }

    /// Unit normal, or `None` for zero-area triangles.
    #[must_use]
    pub fn normal(&self) -> Option<Vector3> {
        let [a, b, c] = &self.vertices;
        triangle_normal(a, b, c)
    }

    /// Returns `true` if the triangle has (near) zero area.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        let [a, b, c] = &self.vertices;
        triangle_cross(a, b, c).norm() < TOLERANCE
    }

    /// Bounding box of the three corners.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        let [a, b, c] = &self.vertices;
        Aabb::new(*a, *b).merged(&Aabb::new(*c, *c))
    }

    /// Length of the longest edge.
    #[must_use]
    pub fn max_edge_length(&self) -> f64 {
        let [a, b, c] = &self.vertices;
        (b - a).norm().max((c - b).norm()).max((a - c).norm())
    }

    /// Closest point on the triangle to `point`.
    #[must_use]
    pub fn closest_point(&self, point: &Point3) -> Point3 {
        let [a, b, c] = &self.vertices;
        closest_point_on_triangle(point, a, b, c)
    }

    /// Distance from `point` to the triangle.
    #[must_use]
    pub fn distance_to(&self, point: &Point3) -> f64 {
        (point - self.closest_point(point)).norm()
    }
}

/// An ordered collection of triangles.
///
/// Owned by the caller and read-only to every stage of the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    triangles: Vec<Triangle>,
}

impl Mesh {
    /// Creates a mesh from a triangle list.
    #[must_use]
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Self { triangles }
    }

    /// Builds a mesh from shared vertices and index triples.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::IndexOutOfRange`] if any index does not address
    /// a vertex.
    pub fn from_indexed(vertices: &[Point3], indices: &[[u32; 3]]) -> Result<Self, MeshError> {
        let lookup = |index: u32| {
            vertices
                .get(index as usize)
                .copied()
                .ok_or(MeshError::IndexOutOfRange {
                    index,
                    vertex_count: vertices.len(),
                })
        };

        let triangles = indices
            .iter()
            .map(|&[i, j, k]| -> Result<Triangle, MeshError> {
                Ok(Triangle::new(lookup(i)?, lookup(j)?, lookup(k)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { triangles })
    }

    /// The triangles in input order.
    #[must_use]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Number of triangles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Returns `true` if the mesh has no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Number of triangle corners (three per triangle, shared or not).
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.triangles.len() * 3
    }

    /// Number of zero-area triangles.
    #[must_use]
    pub fn degenerate_count(&self) -> usize {
        self.triangles.iter().filter(|t| t.is_degenerate()).count()
    }

    /// Axis-aligned bounds of all corners, or `None` for an empty mesh.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.triangles.iter().flat_map(|t| t.vertices.iter()))
    }
}

impl FromIterator<Triangle> for Mesh {
    fn from_iter<I: IntoIterator<Item = Triangle>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{Mesh, Triangle};
    use crate::math::Point3;

    /// The faces of an axis-aligned box as outward-facing triangle pairs, in
    /// the order -x, +x, -y, +y, -z, +z.
    pub fn box_faces(lo: Point3, hi: Point3) -> [[Triangle; 2]; 6] {
        let v = |i: usize| {
            Point3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            )
        };
        [
            [0, 4, 6, 2],
            [1, 3, 7, 5],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 2, 3, 1],
            [4, 5, 7, 6],
        ]
        .map(|q| {
            [
                Triangle::new(v(q[0]), v(q[1]), v(q[2])),
                Triangle::new(v(q[0]), v(q[2]), v(q[3])),
            ]
        })
    }

    /// Closed axis-aligned box.
    pub fn box_mesh(lo: Point3, hi: Point3) -> Mesh {
        box_faces(lo, hi).into_iter().flatten().collect()
    }
}
