//! Parallelogram primitive, used for walls, floors and mirrors.

use crate::polygon::{clip_polygon, polygon_area, polygon_bounds, polygon_overlaps_box};
use crate::primitive::{MaterialId, Primitive, SplitBounds, SurfaceHit};
use refrax_math::{is_near_zero, Aabb, Ray, Vec3, EPSILON};

/// A parallelogram spanned by `corner`, `corner + u` and `corner + v`.
#[derive(Debug, Clone)]
pub struct Quad {
    corner: Vec3,
    u: Vec3,
    v: Vec3,
    /// Unit normal, `u × v`
    normal: Vec3,
    /// Plane offset along the normal
    d: f64,
    /// `n / (n · n)` for the unnormalized normal, used for planar coordinates
    w: Vec3,
    material: MaterialId,
    bbox: Aabb,
}

impl Quad {
    pub fn new(corner: Vec3, u: Vec3, v: Vec3, material: MaterialId) -> Self {
        let n = u.cross(v);
        let normal = n.normalize_or_zero();
        let nn = n.length_squared();
        let w = if nn > 0.0 { n / nn } else { Vec3::ZERO };

        let corners = [corner, corner + u, corner + v, corner + u + v];
        let min = corners.iter().fold(corner, |acc, &p| acc.min(p));
        let max = corners.iter().fold(corner, |acc, &p| acc.max(p));

        Self {
            corner,
            u,
            v,
            normal,
            d: normal.dot(corner),
            w,
            material,
            bbox: Aabb::from_points(min, max),
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    fn outline(&self) -> [Vec3; 4] {
        [
            self.corner,
            self.corner + self.u,
            self.corner + self.u + self.v,
            self.corner + self.v,
        ]
    }

    /// Returns `(t, alpha, beta)` with the planar coordinates in `[0, 1]`.
    fn solve(&self, ray: &Ray) -> Option<(f64, f64, f64)> {
        let denom = self.normal.dot(ray.direction);
        if is_near_zero(denom) {
            return None;
        }

        let t = (self.d - self.normal.dot(ray.origin)) / denom;
        if !(t > EPSILON && t.is_finite()) {
            return None;
        }

        let planar = ray.at(t) - self.corner;
        let alpha = self.w.dot(planar.cross(self.v));
        let beta = self.w.dot(self.u.cross(planar));
        if !(0.0..=1.0).contains(&alpha) || !(0.0..=1.0).contains(&beta) {
            return None;
        }

        Some((t, alpha, beta))
    }
}

impl Primitive for Quad {
    fn bounds(&self) -> Aabb {
        self.bbox
    }

    fn nearest_hit(&self, ray: &Ray) -> Option<f64> {
        self.solve(ray).map(|(t, _, _)| t)
    }

    fn intersect(&self, ray: &Ray, distance: f64) -> SurfaceHit {
        let uv = self.solve(ray).map(|(_, a, b)| (a, b)).unwrap_or((0.0, 0.0));
        SurfaceHit::new(ray, distance, self.normal, uv)
    }

    fn overlaps(&self, region: &Aabb) -> bool {
        if !self.bbox.overlaps(region) {
            return false;
        }
        polygon_overlaps_box(&self.outline(), self.normal, region)
    }

    fn surface_area(&self) -> f64 {
        self.u.cross(self.v).length()
    }

    fn split_surface_area(&self, position: f64, axis: usize) -> f64 {
        let (below, _) = clip_polygon(&self.outline(), axis, position);
        polygon_area(&below)
    }

    fn split_at(&self, position: f64, axis: usize) -> SplitBounds {
        let (below, above) = clip_polygon(&self.outline(), axis, position);
        SplitBounds {
            below: polygon_bounds(&below),
            above: polygon_bounds(&above),
        }
    }

    fn material(&self) -> MaterialId {
        self.material
    }
}
