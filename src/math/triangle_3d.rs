use super::{Point3, Vector3, TOLERANCE};

/// Twice the area of triangle `(a, b, c)` as the cross product of two edges.
#[must_use]
pub fn triangle_cross(a: &Point3, b: &Point3, c: &Point3) -> Vector3 {
    (b - a).cross(&(c - a))
}

/// Area of triangle `(a, b, c)`.
#[must_use]
pub fn triangle_area(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    0.5 * triangle_cross(a, b, c).norm()
}

/// Unit normal of triangle `(a, b, c)` following the right-hand rule.
///
/// Returns `None` when the triangle has (near) zero area.
#[must_use]
pub fn triangle_normal(a: &Point3, b: &Point3, c: &Point3) -> Option<Vector3> {
    let n = triangle_cross(a, b, c);
    let len = n.norm();
    if len < TOLERANCE {
        None
    } else {
        Some(n / len)
    }
}

/// Closest point to `point` on the solid triangle `(a, b, c)`.
///
/// Walks the Voronoi regions of the vertices, then the edges, then the
/// face. Well defined for degenerate triangles as well, where it falls
/// back to the closest point on the collapsed edge or vertex.
#[must_use]
pub fn closest_point_on_triangle(point: &Point3, a: &Point3, b: &Point3, c: &Point3) -> Point3 {
    let ab = b - a;
    let ac = c - a;
    let ap = point - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = point - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = point - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = va + vb + vc;
    if denom.abs() < TOLERANCE * TOLERANCE {
        return *a;
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}

/// Squared distance from `point` to the solid triangle `(a, b, c)`.
#[must_use]
pub fn distance_squared_to_triangle(point: &Point3, a: &Point3, b: &Point3, c: &Point3) -> f64 {
    (point - closest_point_on_triangle(point, a, b, c)).norm_squared()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn unit_tri() -> [Point3; 3] {
        [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)]
    }

    // ── closest_point_on_triangle ──

    #[test]
    fn point_above_face_projects_onto_plane() {
        let [a, b, c] = unit_tri();
        let q = closest_point_on_triangle(&p(0.25, 0.25, 3.0), &a, &b, &c);
        assert_relative_eq!(q, p(0.25, 0.25, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn point_beyond_vertex_snaps_to_vertex() {
        let [a, b, c] = unit_tri();
        let q = closest_point_on_triangle(&p(-1.0, -1.0, 0.5), &a, &b, &c);
        assert_relative_eq!(q, a, epsilon = 1e-12);

        let q = closest_point_on_triangle(&p(3.0, -0.5, 0.0), &a, &b, &c);
        assert_relative_eq!(q, b, epsilon = 1e-12);
    }

    #[test]
    fn point_beside_hypotenuse_projects_onto_edge() {
        let [a, b, c] = unit_tri();
        let q = closest_point_on_triangle(&p(1.0, 1.0, 0.0), &a, &b, &c);
        assert_relative_eq!(q, p(0.5, 0.5, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn point_beside_leg_projects_onto_edge() {
        let [a, b, c] = unit_tri();
        let q = closest_point_on_triangle(&p(0.5, -2.0, 1.0), &a, &b, &c);
        assert_relative_eq!(q, p(0.5, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn degenerate_triangle_does_not_panic() {
        let a = p(0.0, 0.0, 0.0);
        let b = p(1.0, 0.0, 0.0);
        let q = closest_point_on_triangle(&p(0.5, 1.0, 0.0), &a, &b, &b);
        assert!(q.coords.iter().all(|x| x.is_finite()));
        assert_relative_eq!(q.y, 0.0, epsilon = 1e-12);

        let q = closest_point_on_triangle(&p(0.5, 1.0, 0.0), &a, &a, &a);
        assert_eq!(q, a);
    }

    // ── area / normal ──

    #[test]
    fn area_and_normal_of_unit_triangle() {
        let [a, b, c] = unit_tri();
        assert_relative_eq!(triangle_area(&a, &b, &c), 0.5);
        let n = triangle_normal(&a, &b, &c).unwrap();
        assert_relative_eq!(n, Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn collinear_triangle_has_no_normal() {
        let n = triangle_normal(&p(0.0, 0.0, 0.0), &p(1.0, 1.0, 1.0), &p(2.0, 2.0, 2.0));
        assert!(n.is_none());
    }

    #[test]
    fn distance_squared_matches_offset() {
        let [a, b, c] = unit_tri();
        let d2 = distance_squared_to_triangle(&p(0.2, 0.2, -0.5), &a, &b, &c);
        assert_relative_eq!(d2, 0.25, epsilon = 1e-12);
    }
}
