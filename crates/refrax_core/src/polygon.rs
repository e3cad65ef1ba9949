//! Convex planar polygon helpers shared by the flat primitives.
//!
//! Triangles and quads clip themselves against axis planes when the
//! plane-split builder estimates split costs, and use a separating-axis
//! test to decide which grid cells or octants they really touch.

use refrax_math::{Aabb, Vec3};

/// Split a convex polygon by the plane `axis = position`.
///
/// Returns the vertices of the part below and above the plane. Vertices on
/// the plane belong to both parts.
pub fn clip_polygon(vertices: &[Vec3], axis: usize, position: f64) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut below = Vec::with_capacity(vertices.len() + 1);
    let mut above = Vec::with_capacity(vertices.len() + 1);

    for (i, &a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        let da = a[axis] - position;
        let db = b[axis] - position;

        if da <= 0.0 {
            below.push(a);
        }
        if da >= 0.0 {
            above.push(a);
        }
        if (da < 0.0 && db > 0.0) || (da > 0.0 && db < 0.0) {
            let t = da / (da - db);
            let mut p = a + (b - a) * t;
            // Snap onto the plane exactly
            p[axis] = position;
            below.push(p);
            above.push(p);
        }
    }

    (below, above)
}

/// Area of a planar polygon.
pub fn polygon_area(vertices: &[Vec3]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut sum = Vec3::ZERO;
    for i in 1..vertices.len() - 1 {
        sum += (vertices[i] - vertices[0]).cross(vertices[i + 1] - vertices[0]);
    }
    0.5 * sum.length()
}

/// Exact bounds of a point set, `None` if it is empty.
pub fn polygon_bounds(vertices: &[Vec3]) -> Option<Aabb> {
    let first = *vertices.first()?;
    let (min, max) = vertices
        .iter()
        .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    Some(Aabb::exact(min, max))
}

/// Separating-axis overlap test between a convex planar polygon and a box.
///
/// Touching counts as overlapping.
pub fn polygon_overlaps_box(vertices: &[Vec3], normal: Vec3, region: &Aabb) -> bool {
    if vertices.is_empty() || region.is_empty() {
        return false;
    }

    // Box face normals
    for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
        if separated_along(axis, vertices, region) {
            return false;
        }
    }

    // Polygon plane
    if separated_along(normal, vertices, region) {
        return false;
    }

    // Edge / box-axis cross products
    for (i, &a) in vertices.iter().enumerate() {
        let edge = vertices[(i + 1) % vertices.len()] - a;
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            let candidate = edge.cross(axis);
            if candidate.length_squared() < 1e-24 {
                continue;
            }
            if separated_along(candidate, vertices, region) {
                return false;
            }
        }
    }

    true
}

fn separated_along(axis: Vec3, vertices: &[Vec3], region: &Aabb) -> bool {
    let (lo, hi) = vertices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        let d = p.dot(axis);
        (lo.min(d), hi.max(d))
    });
    let span = region.project(axis);
    hi < span.min || span.max < lo
}
