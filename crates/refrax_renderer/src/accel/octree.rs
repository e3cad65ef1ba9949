//! Octree with eight-way subdivision at the node center.
//!
//! Nodes live in one flat vector; interior nodes hold the indices of their
//! eight children. Octant numbering uses bit 0 for x, bit 1 for y and bit 2
//! for z, set when the octant lies on the upper side of the center.

use refrax_core::{Primitive, PrimitiveId};
use refrax_math::{is_near_zero, Aabb, Interval, Ray, Vec3, EPSILON};

use super::{closest_hit_in, scene_bounds, AccelKind, Hit, IndexStats, SpatialIndex};
use crate::compact::{CompactedReferences, ReferenceCompactor};

#[derive(Debug, Clone, Copy)]
enum OctreeNode {
    Interior { center: Vec3, children: [u32; 8] },
    /// Leaf index during the build, packed reference range afterwards
    Leaf { references: u64 },
}

/// Bounds of one octant of `bounds` split at `center`.
fn octant_bounds(bounds: &Aabb, center: Vec3, octant: usize) -> Aabb {
    let (lo, hi) = (bounds.min(), bounds.max());
    let mut min = Vec3::ZERO;
    let mut max = Vec3::ZERO;
    for axis in 0..3 {
        if octant & (1 << axis) != 0 {
            min[axis] = center[axis];
            max[axis] = hi[axis];
        } else {
            min[axis] = lo[axis];
            max[axis] = center[axis];
        }
    }
    Aabb::exact(min, max)
}

pub struct Octree<'a> {
    primitives: &'a [Box<dyn Primitive>],
    bounds: Aabb,
    nodes: Vec<OctreeNode>,
    references: CompactedReferences,
    leaves: usize,
    depth: usize,
}

struct OctreeBuilder<'a> {
    primitives: &'a [Box<dyn Primitive>],
    max_items: usize,
    max_depth: usize,
    nodes: Vec<OctreeNode>,
    compactor: ReferenceCompactor,
    depth: usize,
}

impl OctreeBuilder<'_> {
    fn build_node(&mut self, bounds: Aabb, items: Vec<PrimitiveId>, depth: usize) -> u32 {
        self.depth = self.depth.max(depth);
        if items.len() <= self.max_items || depth >= self.max_depth {
            return self.leaf(items);
        }

        let center = bounds.centroid();
        let primitives = self.primitives;
        let child_items: [Vec<PrimitiveId>; 8] = std::array::from_fn(|octant| {
            let region = octant_bounds(&bounds, center, octant).grow(EPSILON);
            items
                .iter()
                .copied()
                .filter(|&id| {
                    let primitive = &primitives[id as usize];
                    primitive.bounds().overlaps(&region) && primitive.overlaps(&region)
                })
                .collect()
        });

        // Subdividing further would only copy the same list eight times
        if child_items.iter().all(|child| child.len() == items.len()) {
            return self.leaf(items);
        }

        let index = self.nodes.len() as u32;
        self.nodes.push(OctreeNode::Leaf { references: 0 });
        let mut children = [0u32; 8];
        for (octant, list) in child_items.into_iter().enumerate() {
            children[octant] = self.build_node(octant_bounds(&bounds, center, octant), list, depth + 1);
        }
        self.nodes[index as usize] = OctreeNode::Interior { center, children };
        index
    }

    fn leaf(&mut self, items: Vec<PrimitiveId>) -> u32 {
        let leaf = self.compactor.add_leaf(items);
        self.nodes.push(OctreeNode::Leaf {
            references: leaf as u64,
        });
        (self.nodes.len() - 1) as u32
    }
}

impl<'a> Octree<'a> {
    /// Subdivide until a node holds at most `max_items` primitives or
    /// `max_depth` is reached.
    pub fn build(primitives: &'a [Box<dyn Primitive>], max_items: usize, max_depth: usize) -> Self {
        let bounds = scene_bounds(primitives);
        if primitives.is_empty() || bounds.is_empty() {
            return Self {
                primitives,
                bounds: Aabb::EMPTY,
                nodes: Vec::new(),
                references: CompactedReferences::default(),
                leaves: 0,
                depth: 0,
            };
        }
        let bounds = bounds.grow(EPSILON);

        let mut builder = OctreeBuilder {
            primitives,
            max_items: max_items.max(1),
            max_depth,
            nodes: Vec::new(),
            compactor: ReferenceCompactor::new(),
            depth: 0,
        };
        let all = (0..primitives.len() as PrimitiveId).collect();
        builder.build_node(bounds, all, 0);

        let leaves = builder.compactor.leaf_count();
        let references = builder.compactor.compact();
        let mut nodes = builder.nodes;
        for node in &mut nodes {
            if let OctreeNode::Leaf { references: r } = node {
                *r = references.descriptor(*r as usize);
            }
        }

        Self {
            primitives,
            bounds,
            nodes,
            references,
            leaves,
            depth: builder.depth,
        }
    }

    /// Visit the octants of `node` in the order the ray crosses them
    /// between `t_min` and `t_max`.
    fn traverse(
        &self,
        node: u32,
        ray: &Ray,
        t_min: f64,
        t_max: f64,
        max_distance: f64,
        best: &mut Option<Hit>,
    ) {
        let (center, children) = match self.nodes[node as usize] {
            OctreeNode::Leaf { references } => {
                let ids = self.references.resolve(references);
                closest_hit_in(self.primitives, ids.iter().copied(), ray, max_distance, best);
                return;
            }
            OctreeNode::Interior { center, children } => (center, children),
        };

        // Octant holding the ray at t_min, and where it crosses each center plane
        let mut octant = 0usize;
        let mut crossing = [f64::INFINITY; 3];
        for axis in 0..3 {
            let bit = 1 << axis;
            let d = ray.direction[axis];
            if is_near_zero(d) {
                if ray.origin[axis] >= center[axis] {
                    octant |= bit;
                }
                continue;
            }
            let t = (center[axis] - ray.origin[axis]) / d;
            if t > t_min {
                crossing[axis] = t;
                if d < 0.0 {
                    octant |= bit;
                }
            } else if d > 0.0 {
                octant |= bit;
            }
        }

        let mut t_enter = t_min;
        loop {
            let mut axis = 0;
            for candidate in 1..3 {
                if crossing[candidate] < crossing[axis] {
                    axis = candidate;
                }
            }
            let t_next = crossing[axis];

            self.traverse(
                children[octant],
                ray,
                t_enter,
                t_next.min(t_max),
                max_distance,
                best,
            );

            if !t_next.is_finite() || t_next > t_max {
                return;
            }
            if best.is_some_and(|hit: Hit| hit.distance < t_next) {
                return;
            }

            let bit = 1 << axis;
            if ray.direction[axis] > 0.0 {
                if octant & bit != 0 {
                    return;
                }
                octant |= bit;
            } else {
                if octant & bit == 0 {
                    return;
                }
                octant &= !bit;
            }
            t_enter = t_next;
            crossing[axis] = f64::INFINITY;
        }
    }
}

impl SpatialIndex for Octree<'_> {
    fn calculate_hit(&self, ray: &Ray, max_distance: f64) -> Option<Hit> {
        if self.nodes.is_empty() {
            return None;
        }
        let range = self.bounds.clip(ray, Interval::new(0.0, max_distance))?;
        let mut best = None;
        self.traverse(0, ray, range.min, range.max, max_distance, &mut best);
        best
    }

    fn stats(&self) -> IndexStats {
        let compaction = self.references.stats();
        IndexStats {
            kind: AccelKind::Octree,
            primitives: self.primitives.len(),
            leaves: self.leaves,
            stored_references: compaction.stored_references,
            raw_references: compaction.raw_references,
            depth: self.depth,
        }
    }
}
