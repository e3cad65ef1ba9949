//! Sphere primitive.

use crate::primitive::{MaterialId, Primitive, SplitBounds, SurfaceHit};
use refrax_math::{Aabb, Interval, Ray, Vec3, EPSILON};
use std::f64::consts::PI;

/// A sphere primitive.
#[derive(Debug, Clone)]
pub struct Sphere {
    center: Vec3,
    radius: f64,
    material: MaterialId,
    bbox: Aabb,
}

impl Sphere {
    /// Create a new sphere. Negative radii are clamped to zero.
    pub fn new(center: Vec3, radius: f64, material: MaterialId) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);
        let bbox = Aabb::from_points(center - rvec, center + rvec);

        Self {
            center,
            radius,
            material,
            bbox,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Get the UV coordinates for a point on the unit sphere.
    fn get_sphere_uv(p: Vec3) -> (f64, f64) {
        // theta: angle down from +Y
        // phi: angle around Y axis from +X
        let theta = (-p.y).clamp(-1.0, 1.0).acos();
        let phi = (-p.z).atan2(p.x) + PI;

        (phi / (2.0 * PI), theta / PI)
    }
}

impl Primitive for Sphere {
    fn bounds(&self) -> Aabb {
        self.bbox
    }

    fn nearest_hit(&self, ray: &Ray) -> Option<f64> {
        let oc = self.center - ray.origin;
        let a = ray.direction.length_squared();
        if a <= 0.0 || self.radius <= 0.0 {
            return None;
        }
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Find the nearest root in front of the origin
        let near = (h - sqrtd) / a;
        if near > EPSILON {
            return Some(near);
        }
        let far = (h + sqrtd) / a;
        (far > EPSILON).then_some(far)
    }

    fn intersect(&self, ray: &Ray, distance: f64) -> SurfaceHit {
        let outward_normal = (ray.at(distance) - self.center) / self.radius;
        let uv = Self::get_sphere_uv(outward_normal);
        SurfaceHit::new(ray, distance, outward_normal, uv)
    }

    fn overlaps(&self, region: &Aabb) -> bool {
        // Distance from the center to the closest point of the box
        let closest = self.center.clamp(region.min(), region.max());
        (closest - self.center).length_squared() <= self.radius * self.radius
    }

    fn surface_area(&self) -> f64 {
        4.0 * PI * self.radius * self.radius
    }

    /// Exact: a spherical zone's area is `2πr` times its height.
    fn split_surface_area(&self, position: f64, axis: usize) -> f64 {
        let bottom = self.center[axis] - self.radius;
        let height = (position - bottom).clamp(0.0, 2.0 * self.radius);
        2.0 * PI * self.radius * height
    }

    fn split_at(&self, position: f64, axis: usize) -> SplitBounds {
        let extent = Interval::new(self.center[axis] - self.radius, self.center[axis] + self.radius);
        let below = (extent.min <= position).then(|| {
            self.bbox
                .with_axis_interval(axis, Interval::new(extent.min, position.min(extent.max)))
        });
        let above = (extent.max >= position).then(|| {
            self.bbox
                .with_axis_interval(axis, Interval::new(position.max(extent.min), extent.max))
        });
        SplitBounds { below, above }
    }

    fn material(&self) -> MaterialId {
        self.material
    }
}
