use crate::{is_near_zero, Interval, Ray, Vec3};

/// Axis-Aligned Bounding Box used by every spatial index.
///
/// An AABB is defined by three intervals (one per axis) that bound a 3D volume.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create a new AABB from three intervals.
    pub fn new(x: Interval, y: Interval, z: Interval) -> Self {
        let mut aabb = Self { x, y, z };
        aabb.pad_to_minimums();
        aabb
    }

    /// Create an AABB from two corner points.
    ///
    /// Flat boxes are padded so every axis has a usable width.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        let mut aabb = Self::exact(a.min(b), a.max(b));
        aabb.pad_to_minimums();
        aabb
    }

    /// Create an AABB from its min and max corners without any padding.
    pub fn exact(min: Vec3, max: Vec3) -> Self {
        Self {
            x: Interval::new(min.x, max.x),
            y: Interval::new(min.y, max.y),
            z: Interval::new(min.z, max.z),
        }
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    /// The region common to both boxes. Empty if they do not overlap.
    pub fn intersection(a: &Aabb, b: &Aabb) -> Self {
        Self {
            x: Interval::intersection(&a.x, &b.x),
            y: Interval::intersection(&a.y, &b.y),
            z: Interval::intersection(&a.z, &b.z),
        }
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        match n {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Returns a copy with the interval of one axis replaced.
    pub fn with_axis_interval(&self, n: usize, interval: Interval) -> Aabb {
        let mut out = *self;
        match n {
            0 => out.x = interval,
            1 => out.y = interval,
            _ => out.z = interval,
        }
        out
    }

    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    pub fn size(&self) -> Vec3 {
        Vec3::new(self.x.size(), self.y.size(), self.z.size())
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.min().is_finite() && self.max().is_finite()
    }

    pub fn volume(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Closed-box overlap test: touching faces count as overlapping.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x.overlaps(&other.x) && self.y.overlaps(&other.y) && self.z.overlaps(&other.z)
    }

    /// Grow every face outward by `margin`.
    pub fn grow(&self, margin: f64) -> Aabb {
        Self {
            x: self.x.expand(2.0 * margin),
            y: self.y.expand(2.0 * margin),
            z: self.z.expand(2.0 * margin),
        }
    }

    /// Projection of the box onto a direction: `[min, max]` of `corner · n`.
    pub fn project(&self, n: Vec3) -> Interval {
        // Pick the corner extremes per component instead of testing all eight
        let lo = self.min();
        let hi = self.max();
        let near = Vec3::new(
            if n.x >= 0.0 { lo.x } else { hi.x },
            if n.y >= 0.0 { lo.y } else { hi.y },
            if n.z >= 0.0 { lo.z } else { hi.z },
        );
        let far = Vec3::new(
            if n.x >= 0.0 { hi.x } else { lo.x },
            if n.y >= 0.0 { hi.y } else { lo.y },
            if n.z >= 0.0 { hi.z } else { lo.z },
        );
        Interval::new(near.dot(n), far.dot(n))
    }

    /// Clip a ray against the box using the slab method.
    ///
    /// Returns the entry/exit parameters restricted to `ray_t`, or `None` if
    /// the ray misses. A ray grazing a face still counts as entering. Axes
    /// where the direction is near zero constrain only the origin.
    pub fn clip(&self, r: &Ray, mut ray_t: Interval) -> Option<Interval> {
        for axis in 0..3 {
            let slab = self.axis_interval(axis);
            let origin = r.origin[axis];
            let dir = r.direction[axis];

            if is_near_zero(dir) {
                if !slab.contains(origin) {
                    return None;
                }
                continue;
            }

            let adinv = 1.0 / dir;
            let mut t0 = (slab.min - origin) * adinv;
            let mut t1 = (slab.max - origin) * adinv;
            if adinv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            ray_t.min = t0.max(ray_t.min);
            ray_t.max = t1.min(ray_t.max);
            if ray_t.max < ray_t.min {
                return None;
            }
        }
        Some(ray_t)
    }

    /// Pad intervals to avoid zero-width AABBs (degenerate cases).
    fn pad_to_minimums(&mut self) {
        let delta = 0.0001;
        if self.x.size() < delta {
            self.x = self.x.expand(delta);
        }
        if self.y.size() < delta {
            self.y = self.y.expand(delta);
        }
        if self.z.size() < delta {
            self.z = self.z.expand(delta);
        }
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };
}
