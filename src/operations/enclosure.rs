use rayon::prelude::*;

use crate::grid::{Grid, GridFrame, VoxelState};
use crate::mesh::{Mesh, Triangle};

/// Rays cast from each cell centre: both directions along every axis.
const RAYS: u8 = 6;

/// Decides from the mesh itself which cell centres it encloses.
///
/// Each centre casts six axis-aligned rays and counts the surface crossings
/// along each one; an odd count is a vote for inside. A centre is enclosed
/// when most of its rays agree. On a closed mesh all six votes agree. A
/// mesh with a missing patch only loses the votes of rays that leave
/// through the patch, so a shell missing a whole face still reads as
/// enclosed, while the air between closed parts never does.
///
/// Crossings are precomputed once per grid column, so a query costs three
/// binary searches.
pub struct Enclosure {
    frame: GridFrame,
    axes: [ColumnCrossings; 3],
}

impl Enclosure {
    /// Casts every grid column of `frame` against `mesh`.
    #[must_use]
    pub fn new(mesh: &Mesh, frame: &GridFrame) -> Self {
        Self {
            frame: *frame,
            axes: std::array::from_fn(|axis| ColumnCrossings::build(mesh, frame, axis)),
        }
    }

    /// Number of rays from the centre of `cell` that cross the surface an
    /// odd number of times, out of six.
    #[must_use]
    pub fn votes(&self, cell: [usize; 3]) -> u8 {
        let centre = self.frame.cell_center(cell);
        (0..3)
            .map(|axis| {
                let (u, v) = plane_axes(axis);
                let column = cell[u] + self.frame.dims[u] * cell[v];
                let crossings = self.axes[axis].column(column);
                let c = centre[axis];
                let below = crossings.partition_point(|&t| t < c);
                let above = crossings.len() - crossings.partition_point(|&t| t <= c);
                u8::from(below % 2 == 1) + u8::from(above % 2 == 1)
            })
            .sum()
    }

    /// Returns `true` if a majority of rays from the centre of `cell` report
    /// it inside the mesh.
    #[must_use]
    pub fn encloses(&self, cell: [usize; 3]) -> bool {
        2 * self.votes(cell) > RAYS
    }

    /// Counts `Exterior` cells of `grid` that the mesh encloses.
    #[must_use]
    pub fn count_leaked(&self, grid: &Grid) -> usize {
        grid.cells()
            .par_iter()
            .enumerate()
            .filter(|&(index, &state)| {
                state == VoxelState::Exterior && self.encloses(grid.coords(index))
            })
            .count()
    }
}

/// The two axes spanning the plane perpendicular to `axis`.
fn plane_axes(axis: usize) -> (usize, usize) {
    ((axis + 1) % 3, (axis + 2) % 3)
}

/// Sorted crossing positions of every grid column along one axis, stored
/// back to back.
struct ColumnCrossings {
    /// Start of each column's run in `positions`, plus one trailing end.
    offsets: Vec<usize>,
    positions: Vec<f64>,
}

impl ColumnCrossings {
    fn build(mesh: &Mesh, frame: &GridFrame, axis: usize) -> Self {
        let (u, v) = plane_axes(axis);
        let columns = frame.dims[u] * frame.dims[v];

        let mut hits: Vec<(usize, f64)> = mesh
            .triangles()
            .par_iter()
            .filter(|t| !t.is_degenerate())
            .flat_map_iter(|t| column_hits(t, frame, axis))
            .collect();
        hits.par_sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut offsets = Vec::with_capacity(columns + 1);
        let mut cursor = 0;
        for column in 0..columns {
            offsets.push(cursor);
            while cursor < hits.len() && hits[cursor].0 == column {
                cursor += 1;
            }
        }
        offsets.push(cursor);

        Self {
            offsets,
            positions: hits.into_iter().map(|(_, t)| t).collect(),
        }
    }

    fn column(&self, column: usize) -> &[f64] {
        &self.positions[self.offsets[column]..self.offsets[column + 1]]
    }
}

/// Columns along `axis` whose centre line passes through `triangle`, with
/// the position of each crossing along the axis.
///
/// A centre line through a shared edge or vertex is credited to exactly one
/// of the triangles meeting there.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn column_hits(triangle: &Triangle, frame: &GridFrame, axis: usize) -> Vec<(usize, f64)> {
    let (u, v) = plane_axes(axis);
    let projected = triangle.vertices.map(|p| [p[u], p[v]]);
    let depth = triangle.vertices.map(|p| p[axis]);

    let area = cross(projected[0], projected[1], projected[2]);
    if area == 0.0 {
        // Parallel to the columns.
        return Vec::new();
    }
    let sign = area.signum();

    let span = |k: usize| {
        let lo = projected.iter().map(|p| p[k]).fold(f64::INFINITY, f64::min);
        let hi = projected.iter().map(|p| p[k]).fold(f64::NEG_INFINITY, f64::max);
        let axis_k = if k == 0 { u } else { v };
        // One column of margin; the edge test decides the boundary exactly.
        let scale = |x: f64| (x - frame.origin[axis_k]) / frame.voxel_size - 0.5;
        let first = (scale(lo).ceil() - 1.0).max(0.0);
        let last = (scale(hi).floor() + 1.0).min((frame.dims[axis_k] - 1) as f64);
        (first <= last).then(|| (first as usize)..=(last as usize))
    };
    let (Some(range_u), Some(range_v)) = (span(0), span(1)) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    for j in range_v {
        for i in range_u.clone() {
            let mut cell = [0; 3];
            cell[u] = i;
            cell[v] = j;
            let centre = frame.cell_center(cell);
            let q = [centre[u], centre[v]];

            let mut weights = [0.0; 3];
            let mut inside = true;
            for (k, weight) in weights.iter_mut().enumerate() {
                let a = projected[(k + 1) % 3];
                let b = projected[(k + 2) % 3];
                let e = edge_function(a, b, q) * sign;
                let d = if sign > 0.0 {
                    [b[0] - a[0], b[1] - a[1]]
                } else {
                    [a[0] - b[0], a[1] - b[1]]
                };
                if e < 0.0 || (e == 0.0 && !is_top_left(d)) {
                    inside = false;
                    break;
                }
                *weight = e;
            }
            if !inside {
                continue;
            }

            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                continue;
            }
            let t = (0..3).map(|k| weights[k] * depth[k]).sum::<f64>() / total;
            hits.push((i + frame.dims[u] * j, t));
        }
    }
    hits
}

fn cross(a: [f64; 2], b: [f64; 2], q: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (q[1] - a[1]) - (b[1] - a[1]) * (q[0] - a[0])
}

/// Signed side of `q` relative to the edge `a -> b`.
///
/// Evaluated with the endpoints in a fixed order, so the two triangles
/// sharing an edge get exactly opposite values.
fn edge_function(a: [f64; 2], b: [f64; 2], q: [f64; 2]) -> f64 {
    if (a[0], a[1]) <= (b[0], b[1]) {
        cross(a, b, q)
    } else {
        -cross(b, a, q)
    }
}

/// Tie-break for points exactly on an edge: owned by the triangle that
/// traverses the edge upward, or leftward when horizontal.
fn is_top_left(d: [f64; 2]) -> bool {
    d[1] > 0.0 || (d[1] == 0.0 && d[0] < 0.0)
}
