//! Triangle primitive.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use crate::polygon::{clip_polygon, polygon_area, polygon_bounds, polygon_overlaps_box};
use crate::primitive::{MaterialId, Primitive, SplitBounds, SurfaceHit};
use refrax_math::{is_near_zero, Aabb, Ray, Vec3, EPSILON};

/// A triangle primitive.
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Vertices
    vertices: [Vec3; 3],
    /// Pre-computed face normal (unit length, zero for degenerate triangles)
    normal: Vec3,
    material: MaterialId,
    bbox: Aabb,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    ///
    /// The face normal follows the winding: `(v1 - v0) × (v2 - v0)`.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, material: MaterialId) -> Self {
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();

        // Pad thin dimensions to avoid degenerate AABBs
        let bbox = Aabb::from_points(v0.min(v1).min(v2), v0.max(v1).max(v2));

        Self {
            vertices: [v0, v1, v2],
            normal,
            material,
            bbox,
        }
    }

    pub fn vertices(&self) -> &[Vec3; 3] {
        &self.vertices
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Returns `(t, u, v)` for the nearest intersection in front of the origin.
    fn moller_trumbore(&self, ray: &Ray) -> Option<(f64, f64, f64)> {
        let [v0, v1, v2] = self.vertices;
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);

        // Ray is parallel to triangle (or the triangle is degenerate)
        if is_near_zero(a) {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        (t > EPSILON && t.is_finite()).then_some((t, u, v))
    }
}

impl Primitive for Triangle {
    fn bounds(&self) -> Aabb {
        self.bbox
    }

    fn nearest_hit(&self, ray: &Ray) -> Option<f64> {
        self.moller_trumbore(ray).map(|(t, _, _)| t)
    }

    fn intersect(&self, ray: &Ray, distance: f64) -> SurfaceHit {
        let uv = self
            .moller_trumbore(ray)
            .map(|(_, u, v)| (u, v))
            .unwrap_or((0.0, 0.0));
        SurfaceHit::new(ray, distance, self.normal, uv)
    }

    fn overlaps(&self, region: &Aabb) -> bool {
        if !self.bbox.overlaps(region) {
            return false;
        }
        polygon_overlaps_box(&self.vertices, self.normal, region)
    }

    fn surface_area(&self) -> f64 {
        polygon_area(&self.vertices)
    }

    fn split_surface_area(&self, position: f64, axis: usize) -> f64 {
        let (below, _) = clip_polygon(&self.vertices, axis, position);
        polygon_area(&below)
    }

    fn split_at(&self, position: f64, axis: usize) -> SplitBounds {
        let (below, above) = clip_polygon(&self.vertices, axis, position);
        SplitBounds {
            below: polygon_bounds(&below),
            above: polygon_bounds(&above),
        }
    }

    fn material(&self) -> MaterialId {
        self.material
    }
}
