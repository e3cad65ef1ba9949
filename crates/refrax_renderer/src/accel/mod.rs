//! Spatial indexes answering nearest-hit queries.
//!
//! Every index is built once from the scene's primitives and is read-only
//! afterwards, so one instance is shared by all render workers. The linear
//! [`NaiveIndex`] is the reference the others are checked against.

mod grid;
mod naive;
mod octree;
mod plane_split;

pub use grid::UniformGrid;
pub use naive::NaiveIndex;
pub use octree::Octree;
pub use plane_split::PlaneSplitTree;

use std::time::Instant;

use refrax_core::{Primitive, PrimitiveId};
use refrax_math::{Ray, Vec3};
use serde::{Deserialize, Serialize};

/// The nearest intersection found by an index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub primitive: PrimitiveId,
    pub distance: f64,
}

impl Hit {
    /// Ordering used by every index: nearer wins, lower id breaks ties.
    #[inline]
    pub fn is_closer_than(&self, other: &Hit) -> bool {
        self.distance < other.distance
            || (self.distance == other.distance && self.primitive < other.primitive)
    }
}

/// Capability shared by all spatial indexes.
pub trait SpatialIndex: Send + Sync {
    /// Nearest primitive hit with `EPSILON < distance <= max_distance`.
    fn calculate_hit(&self, ray: &Ray, max_distance: f64) -> Option<Hit>;

    fn stats(&self) -> IndexStats;
}

/// Size of a built index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub kind: AccelKind,
    pub primitives: usize,
    pub leaves: usize,
    /// References actually stored after compaction
    pub stored_references: usize,
    /// References the leaves ask for
    pub raw_references: usize,
    pub depth: usize,
}

/// Which index to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccelKind {
    Naive,
    #[default]
    Grid,
    Octree,
    PlaneSplit,
}

impl AccelKind {
    pub const ALL: [AccelKind; 4] = [
        AccelKind::Naive,
        AccelKind::Grid,
        AccelKind::Octree,
        AccelKind::PlaneSplit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AccelKind::Naive => "naive",
            AccelKind::Grid => "uniform grid",
            AccelKind::Octree => "octree",
            AccelKind::PlaneSplit => "plane-split tree",
        }
    }
}

/// Build parameters for all index kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelSettings {
    pub kind: AccelKind,
    /// Multiplier on the primitives-per-volume cell count
    pub grid_density: f64,
    pub octree_max_items: usize,
    pub octree_max_depth: usize,
    pub split_max_depth: usize,
    pub split_min_items: usize,
    /// Candidate split normals, normalized at build time
    pub split_normals: Vec<Vec3>,
}

impl Default for AccelSettings {
    fn default() -> Self {
        Self {
            kind: AccelKind::Grid,
            grid_density: 1.0,
            octree_max_items: 8,
            octree_max_depth: 8,
            split_max_depth: 24,
            split_min_items: 2,
            split_normals: vec![Vec3::X, Vec3::Y, Vec3::Z],
        }
    }
}

impl AccelSettings {
    pub fn with_kind(mut self, kind: AccelKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Build the configured index over `primitives`.
pub fn build_index<'a>(
    primitives: &'a [Box<dyn Primitive>],
    settings: &AccelSettings,
) -> Box<dyn SpatialIndex + 'a> {
    let start = Instant::now();
    let index: Box<dyn SpatialIndex + 'a> = match settings.kind {
        AccelKind::Naive => Box::new(NaiveIndex::new(primitives)),
        AccelKind::Grid => Box::new(UniformGrid::build(primitives, settings.grid_density)),
        AccelKind::Octree => Box::new(Octree::build(
            primitives,
            settings.octree_max_items,
            settings.octree_max_depth,
        )),
        AccelKind::PlaneSplit => Box::new(PlaneSplitTree::build(
            primitives,
            &settings.split_normals,
            settings.split_max_depth,
            settings.split_min_items,
        )),
    };

    let stats = index.stats();
    log::info!(
        "Built {} over {} primitives in {:.2?}: {} leaves, depth {}, {} references stored ({} requested)",
        stats.kind.name(),
        stats.primitives,
        start.elapsed(),
        stats.leaves,
        stats.depth,
        stats.stored_references,
        stats.raw_references
    );
    index
}

/// Test every referenced primitive and keep the closest qualifying hit.
#[inline]
pub(crate) fn closest_hit_in(
    primitives: &[Box<dyn Primitive>],
    ids: impl IntoIterator<Item = PrimitiveId>,
    ray: &Ray,
    max_distance: f64,
    best: &mut Option<Hit>,
) {
    for id in ids {
        let Some(distance) = primitives[id as usize].nearest_hit(ray) else {
            continue;
        };
        if !(distance <= max_distance) {
            continue;
        }
        let candidate = Hit {
            primitive: id,
            distance,
        };
        if best.map_or(true, |b| candidate.is_closer_than(&b)) {
            *best = Some(candidate);
        }
    }
}

/// Union of all primitive bounds.
pub(crate) fn scene_bounds(primitives: &[Box<dyn Primitive>]) -> refrax_math::Aabb {
    primitives
        .iter()
        .fold(refrax_math::Aabb::EMPTY, |acc, p| {
            refrax_math::Aabb::surrounding(&acc, &p.bounds())
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use refrax_core::{Quad, Sphere, Triangle};

    pub fn boxed(p: impl Primitive + 'static) -> Box<dyn Primitive> {
        Box::new(p)
    }

    /// Settings that force deep trees on small inputs.
    pub fn fine_settings(kind: AccelKind) -> AccelSettings {
        AccelSettings {
            kind,
            octree_max_items: 2,
            split_min_items: 1,
            ..AccelSettings::default()
        }
    }

    fn random_point(rng: &mut StdRng, extent: f64) -> Vec3 {
        Vec3::new(
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
        )
    }

    pub fn random_triangles(rng: &mut StdRng, count: usize) -> Vec<Box<dyn Primitive>> {
        (0..count)
            .map(|_| {
                let center = random_point(rng, 10.0);
                let size = if rng.gen_bool(0.05) { 6.0 } else { 1.0 };
                boxed(Triangle::new(
                    center + random_point(rng, size),
                    center + random_point(rng, size),
                    center + random_point(rng, size),
                    0,
                ))
            })
            .collect()
    }

    pub fn random_ray(rng: &mut StdRng) -> Ray {
        let origin = random_point(rng, 15.0);
        let target = random_point(rng, 10.0);
        Ray::normalized(origin, target - origin)
    }

    fn assert_same_hit(expected: Option<Hit>, got: Option<Hit>, kind: AccelKind, ray: &Ray) {
        match (expected, got) {
            (None, None) => {}
            (Some(e), Some(g)) => {
                assert_eq!(
                    e.primitive, g.primitive,
                    "{:?} picked a different primitive for {:?}",
                    kind, ray
                );
                let tolerance = 1e-9 * e.distance.abs().max(1.0);
                assert!(
                    (e.distance - g.distance).abs() <= tolerance,
                    "{:?} distance {} != {}",
                    kind,
                    g.distance,
                    e.distance
                );
            }
            _ => panic!("{:?} returned {:?}, naive returned {:?} for {:?}", kind, got, expected, ray),
        }
    }

    /// Check every index kind against the linear scan for the given rays.
    pub fn cross_check(primitives: &[Box<dyn Primitive>], rays: &[(Ray, f64)], settings: &AccelSettings) {
        let naive = NaiveIndex::new(primitives);
        for kind in [AccelKind::Grid, AccelKind::Octree, AccelKind::PlaneSplit] {
            let index = build_index(primitives, &settings.clone().with_kind(kind));
            for (ray, max_distance) in rays {
                assert_same_hit(
                    naive.calculate_hit(ray, *max_distance),
                    index.calculate_hit(ray, *max_distance),
                    kind,
                    ray,
                );
            }
        }
    }

    #[test]
    fn test_hit_ordering() {
        let a = Hit { primitive: 3, distance: 1.0 };
        let b = Hit { primitive: 1, distance: 2.0 };
        let c = Hit { primitive: 1, distance: 1.0 };
        assert!(a.is_closer_than(&b));
        assert!(c.is_closer_than(&a));
        assert!(!a.is_closer_than(&a));
    }

    #[test]
    fn test_settings_json() {
        let settings = AccelSettings::default().with_kind(AccelKind::PlaneSplit);
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"plane_split\""));
        let back: AccelSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);

        let partial: AccelSettings = serde_json::from_str(r#"{"kind": "octree"}"#).unwrap();
        assert_eq!(partial.kind, AccelKind::Octree);
        assert_eq!(partial.octree_max_items, 8);
    }

    #[test]
    fn test_empty_scene_always_misses() {
        let primitives: Vec<Box<dyn Primitive>> = Vec::new();
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        for kind in AccelKind::ALL {
            let index = build_index(&primitives, &AccelSettings::default().with_kind(kind));
            assert!(index.calculate_hit(&ray, f64::INFINITY).is_none(), "{:?}", kind);
        }
    }

    #[test]
    fn test_single_triangle_scenario() {
        let primitives = vec![boxed(Triangle::new(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(1.0, 0.0, 5.0),
            Vec3::new(0.0, 1.0, 5.0),
            0,
        ))];
        let hit_ray = Ray::new(Vec3::new(0.2, 0.2, 0.0), Vec3::Z);
        let miss_ray = Ray::new(Vec3::new(5.0, 5.0, 0.0), Vec3::Z);

        for kind in AccelKind::ALL {
            let index = build_index(&primitives, &AccelSettings::default().with_kind(kind));
            let hit = index.calculate_hit(&hit_ray, f64::INFINITY).unwrap();
            assert_eq!(hit.primitive, 0);
            assert!((hit.distance - 5.0).abs() < 1e-12, "{:?}", kind);
            assert!(index.calculate_hit(&miss_ray, f64::INFINITY).is_none());
            // Max distance is inclusive and excludes anything beyond
            assert!(index.calculate_hit(&hit_ray, 5.0).is_some());
            assert!(index.calculate_hit(&hit_ray, 4.9).is_none());
        }

        let hit = primitives[0].intersect(&hit_ray, 5.0);
        assert!((hit.normal - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-12);
    }

    #[test]
    fn test_analytic_scene() {
        let primitives = vec![
            boxed(Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0, 0)),
            boxed(Sphere::new(Vec3::new(3.0, 0.0, -5.0), 1.0, 0)),
            boxed(Sphere::new(Vec3::new(0.0, 0.0, -9.0), 2.0, 0)),
            boxed(Quad::new(
                Vec3::new(-10.0, -1.0, -20.0),
                Vec3::new(20.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 20.0),
                0,
            )),
            boxed(Triangle::new(
                Vec3::new(-2.0, 2.0, -3.0),
                Vec3::new(2.0, 2.0, -3.0),
                Vec3::new(0.0, 4.0, -3.0),
                0,
            )),
        ];

        let expectations = [
            (Ray::new(Vec3::ZERO, -Vec3::Z), Some((0, 4.0))),
            (Ray::new(Vec3::new(3.0, 0.0, 0.0), -Vec3::Z), Some((1, 4.0))),
            (Ray::new(Vec3::new(0.0, 3.0, 0.0), -Vec3::Z), Some((4, 3.0))),
            (Ray::new(Vec3::new(5.0, 5.0, -10.0), -Vec3::Y), Some((3, 6.0))),
            (Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::Y), None),
        ];

        for kind in AccelKind::ALL {
            let index = build_index(&primitives, &fine_settings(kind));
            for (ray, expected) in &expectations {
                let got = index
                    .calculate_hit(ray, f64::INFINITY)
                    .map(|h| (h.primitive, h.distance));
                match (expected, got) {
                    (None, None) => {}
                    (Some((id, d)), Some((gid, gd))) => {
                        assert_eq!(*id, gid, "{:?} {:?}", kind, ray);
                        assert!((d - gd).abs() < 1e-9, "{:?} {} vs {}", kind, d, gd);
                    }
                    _ => panic!("{:?}: expected {:?}, got {:?}", kind, expected, got),
                }
            }
        }
    }

    #[test]
    fn test_equal_distance_ties_pick_lowest_id() {
        // Two coincident triangles
        let tri = || {
            Triangle::new(
                Vec3::new(-1.0, -1.0, 2.0),
                Vec3::new(1.0, -1.0, 2.0),
                Vec3::new(0.0, 1.0, 2.0),
                0,
            )
        };
        let primitives = vec![
            boxed(Sphere::new(Vec3::new(5.0, 5.0, 5.0), 0.5, 0)),
            boxed(tri()),
            boxed(tri()),
        ];
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        for kind in AccelKind::ALL {
            let index = build_index(&primitives, &fine_settings(kind));
            assert_eq!(index.calculate_hit(&ray, f64::INFINITY).unwrap().primitive, 1);
        }
    }

    #[test]
    fn test_boundary_primitives_are_hit() {
        // Symmetric layout: the root split planes of every tree pass through
        // the origin, where the quads and the small sphere sit.
        let mut primitives = Vec::new();
        for &x in &[-4.0, 4.0] {
            for &y in &[-4.0, 4.0] {
                for &z in &[-4.0, 4.0] {
                    primitives.push(boxed(Sphere::new(Vec3::new(x, y, z), 1.0, 0)));
                }
            }
        }
        // Quad lying in the plane x = 0
        primitives.push(boxed(Quad::new(
            Vec3::new(0.0, -2.0, -2.0),
            Vec3::new(0.0, 4.0, 0.0),
            Vec3::new(0.0, 0.0, 4.0),
            0,
        )));
        // Small sphere straddling the planes x = 0 and z = 0
        primitives.push(boxed(Sphere::new(Vec3::new(0.0, 3.0, 0.0), 0.5, 0)));

        let rays = [
            // Perpendicular through the plane holding the quad
            (Ray::new(Vec3::new(-10.0, 0.5, 0.5), Vec3::X), Some(8)),
            (Ray::new(Vec3::new(10.0, 0.0, 0.0), -Vec3::X), Some(8)),
            // Travelling inside the plane x = 0, hitting the small sphere
            (Ray::new(Vec3::new(0.0, 3.0, -10.0), Vec3::Z), Some(9)),
            (Ray::new(Vec3::new(0.0, 10.0, 0.0), -Vec3::Y), Some(9)),
            // Travelling along the quad's edge, inside its plane
            (Ray::new(Vec3::new(0.0, -10.0, 2.0), Vec3::Y), None),
        ];

        for kind in AccelKind::ALL {
            let index = build_index(&primitives, &fine_settings(kind));
            let naive = NaiveIndex::new(&primitives);
            for (ray, expected) in &rays {
                let got = index.calculate_hit(ray, f64::INFINITY).map(|h| h.primitive);
                let reference = naive.calculate_hit(ray, f64::INFINITY).map(|h| h.primitive);
                assert_eq!(got, reference, "{:?} disagrees with naive for {:?}", kind, ray);
                if expected.is_some() {
                    assert_eq!(got, *expected, "{:?} for {:?}", kind, ray);
                }
            }
        }
    }

    #[test]
    fn test_random_triangle_sets_match_naive() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for &count in &[2usize, 10, 100, 1_000, 10_000] {
            let primitives = random_triangles(&mut rng, count);
            let rays: Vec<(Ray, f64)> = (0..200)
                .map(|i| {
                    let max_distance = if i % 4 == 0 {
                        rng.gen_range(1.0..30.0)
                    } else {
                        f64::INFINITY
                    };
                    (random_ray(&mut rng), max_distance)
                })
                .collect();
            cross_check(&primitives, &rays, &AccelSettings::default());
        }
    }

    #[test]
    fn test_axis_parallel_rays_match_naive() {
        let mut rng = StdRng::seed_from_u64(99);
        let primitives = random_triangles(&mut rng, 500);
        let axes = [Vec3::X, Vec3::Y, Vec3::Z, -Vec3::X, -Vec3::Y, -Vec3::Z];
        let rays: Vec<(Ray, f64)> = (0..300)
            .map(|i| {
                let direction = axes[i % axes.len()];
                let origin = random_point(&mut rng, 10.0) - direction * 15.0;
                (Ray::new(origin, direction), f64::INFINITY)
            })
            .collect();
        cross_check(&primitives, &rays, &fine_settings(AccelKind::Grid));
    }

    #[test]
    fn test_rays_starting_inside_the_scene() {
        let mut rng = StdRng::seed_from_u64(1234);
        let primitives = random_triangles(&mut rng, 2_000);
        let rays: Vec<(Ray, f64)> = (0..300)
            .map(|_| {
                let origin = random_point(&mut rng, 8.0);
                let direction = random_point(&mut rng, 1.0).try_normalize().unwrap_or(Vec3::Y);
                (Ray::new(origin, direction), f64::INFINITY)
            })
            .collect();
        cross_check(&primitives, &rays, &AccelSettings::default());
    }

    #[test]
    fn test_mixed_shapes_match_naive() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut primitives = random_triangles(&mut rng, 200);
        for _ in 0..50 {
            primitives.push(boxed(Sphere::new(
                random_point(&mut rng, 10.0),
                rng.gen_range(0.1..1.5),
                0,
            )));
        }
        primitives.push(boxed(Quad::new(
            Vec3::new(-20.0, -12.0, -20.0),
            Vec3::new(40.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 40.0),
            0,
        )));
        let rays: Vec<(Ray, f64)> = (0..400).map(|_| (random_ray(&mut rng), f64::INFINITY)).collect();
        cross_check(&primitives, &rays, &AccelSettings::default());
        cross_check(&primitives, &rays, &fine_settings(AccelKind::Grid));
    }
}
