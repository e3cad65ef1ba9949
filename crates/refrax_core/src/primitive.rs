//! Primitive trait and intersection records.

use refrax_math::{Aabb, Interval, Ray, Vec3};

/// Stable identity of a primitive: its position in the owning scene.
pub type PrimitiveId = u32;

/// Index of a material registered with the scene.
pub type MaterialId = u32;

/// Full record of a ray-surface intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Ray parameter of the intersection
    pub distance: f64,
    /// Point of intersection
    pub point: Vec3,
    /// Unit surface normal, always pointing against the incoming ray
    pub normal: Vec3,
    /// Parametric surface coordinates
    pub u: f64,
    pub v: f64,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
}

impl SurfaceHit {
    /// Build a record from the geometric (outward) normal.
    ///
    /// The normal is stored pointing against the ray direction, so we
    /// track whether we hit the front or back face.
    pub fn new(ray: &Ray, distance: f64, outward_normal: Vec3, uv: (f64, f64)) -> Self {
        let front_face = ray.direction.dot(outward_normal) < 0.0;
        let normal = if front_face {
            outward_normal
        } else {
            -outward_normal
        };
        Self {
            distance,
            point: ray.at(distance),
            normal,
            u: uv.0,
            v: uv.1,
            front_face,
        }
    }
}

/// Bounds of the parts of a primitive on either side of an axis plane.
///
/// A part touching the plane is reported on that side as well, so a
/// primitive lying in the plane appears on both.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SplitBounds {
    pub below: Option<Aabb>,
    pub above: Option<Aabb>,
}

/// Trait for renderable shapes.
///
/// Primitives are immutable once added to a scene; spatial indexes refer
/// to them by [`PrimitiveId`] and query them concurrently.
pub trait Primitive: Send + Sync {
    /// Axis-aligned bounds of the whole surface.
    fn bounds(&self) -> Aabb;

    /// Smallest ray parameter `t > EPSILON` at which the ray meets the
    /// surface, or `None`.
    fn nearest_hit(&self, ray: &Ray) -> Option<f64>;

    /// Full intersection record at a distance previously returned by
    /// [`Primitive::nearest_hit`].
    fn intersect(&self, ray: &Ray, distance: f64) -> SurfaceHit;

    /// Precise test for whether any part of the surface lies in `region`.
    fn overlaps(&self, region: &Aabb) -> bool {
        self.bounds().overlaps(region)
    }

    fn surface_area(&self) -> f64;

    /// Surface area on the lower side of the plane `axis = position`.
    fn split_surface_area(&self, position: f64, axis: usize) -> f64 {
        let extent = self.bounds().axis_interval(axis);
        if extent.size() <= 0.0 {
            return if position >= extent.min {
                self.surface_area()
            } else {
                0.0
            };
        }
        let fraction = ((position - extent.min) / extent.size()).clamp(0.0, 1.0);
        self.surface_area() * fraction
    }

    /// Split the surface at the plane `axis = position`.
    fn split_at(&self, position: f64, axis: usize) -> SplitBounds {
        split_box(&self.bounds(), position, axis)
    }

    fn material(&self) -> MaterialId;
}

/// Split a box at an axis plane; the fallback for shapes without exact clipping.
pub fn split_box(bounds: &Aabb, position: f64, axis: usize) -> SplitBounds {
    let extent = bounds.axis_interval(axis);
    let below = (extent.min <= position)
        .then(|| bounds.with_axis_interval(axis, Interval::new(extent.min, position.min(extent.max))));
    let above = (extent.max >= position)
        .then(|| bounds.with_axis_interval(axis, Interval::new(position.max(extent.min), extent.max)));
    SplitBounds { below, above }
}
