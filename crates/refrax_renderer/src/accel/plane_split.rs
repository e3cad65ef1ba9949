//! Binary plane-split tree built with the surface-area heuristic.
//!
//! Every interior node splits along one of a fixed set of normals. Instead
//! of a single plane it stores two bounds: the left child covers projected
//! coordinates up to `left_max`, the right child from `right_min` upwards.
//! Primitives straddling the chosen position are referenced by both
//! children, so the two ranges may overlap.

use refrax_core::primitive::split_box;
use refrax_core::{Primitive, PrimitiveId};
use refrax_math::{is_near_zero, Aabb, Interval, Ray, Vec3, EPSILON};

use super::{closest_hit_in, scene_bounds, AccelKind, Hit, IndexStats, SpatialIndex};
use crate::compact::{CompactedReferences, ReferenceCompactor};

#[derive(Debug, Clone, Copy)]
enum SplitNode {
    Interior {
        normal: u16,
        left_max: f64,
        right_min: f64,
        children: [u32; 2],
    },
    /// Leaf index during the build, packed reference range afterwards
    Leaf { references: u64 },
}

/// Part of a primitive seen by one node during the build.
#[derive(Debug, Clone, Copy)]
struct Fragment {
    source: PrimitiveId,
    /// Conservative bounds of the primitive's surface inside the node
    bounds: Aabb,
    /// Estimated surface area inside the node
    area: f64,
}

#[derive(Debug, Clone, Copy)]
struct SplitChoice {
    normal: usize,
    position: f64,
    cost: f64,
    /// Distance of the position from the middle of the node
    off_center: f64,
}

impl SplitChoice {
    fn beats(&self, other: &SplitChoice) -> bool {
        let tolerance = 1e-12 * other.cost.abs().max(1.0);
        if self.cost < other.cost - tolerance {
            return true;
        }
        (self.cost - other.cost).abs() <= tolerance && self.off_center < other.off_center
    }
}

/// Coordinate axis and sign when `n` is `±X`, `±Y` or `±Z`.
fn axis_of(n: Vec3) -> Option<(usize, f64)> {
    (0..3).find_map(|axis| {
        let c = n[axis];
        (c.abs() > 1.0 - 1e-12).then_some((axis, c.signum()))
    })
}

pub struct PlaneSplitTree<'a> {
    primitives: &'a [Box<dyn Primitive>],
    normals: Vec<Vec3>,
    bounds: Aabb,
    nodes: Vec<SplitNode>,
    references: CompactedReferences,
    leaves: usize,
    depth: usize,
}

struct SplitBuilder<'a> {
    primitives: &'a [Box<dyn Primitive>],
    normals: &'a [Vec3],
    max_depth: usize,
    min_items: usize,
    nodes: Vec<SplitNode>,
    compactor: ReferenceCompactor,
    depth: usize,
}

impl SplitBuilder<'_> {
    fn build_node(&mut self, fragments: Vec<Fragment>, depth: usize) -> u32 {
        self.depth = self.depth.max(depth);
        if fragments.len() <= self.min_items || depth >= self.max_depth {
            return self.leaf(&fragments);
        }
        let Some(choice) = self.best_split(&fragments) else {
            return self.leaf(&fragments);
        };

        let n = self.normals[choice.normal];
        let (left, right) = self.partition(&fragments, &choice);
        if left.len() + right.len() > fragments.len() + fragments.len() / 2 + 1 {
            // Mostly straddlers: splitting would only duplicate them
            return self.leaf(&fragments);
        }
        drop(fragments);

        let left_max = left
            .iter()
            .map(|f| f.bounds.project(n).max)
            .fold(f64::NEG_INFINITY, f64::max)
            + EPSILON;
        let right_min = right
            .iter()
            .map(|f| f.bounds.project(n).min)
            .fold(f64::INFINITY, f64::min)
            - EPSILON;

        let index = self.nodes.len() as u32;
        self.nodes.push(SplitNode::Leaf { references: 0 });
        let left_child = self.build_node(left, depth + 1);
        let right_child = self.build_node(right, depth + 1);
        self.nodes[index as usize] = SplitNode::Interior {
            normal: choice.normal as u16,
            left_max,
            right_min,
            children: [left_child, right_child],
        };
        index
    }

    fn leaf(&mut self, fragments: &[Fragment]) -> u32 {
        let leaf = self
            .compactor
            .add_leaf(fragments.iter().map(|f| f.source).collect());
        self.nodes.push(SplitNode::Leaf {
            references: leaf as u64,
        });
        (self.nodes.len() - 1) as u32
    }

    /// Sweep the projected intervals along every normal and return the
    /// cheapest position that leaves each side with fewer fragments.
    fn best_split(&self, fragments: &[Fragment]) -> Option<SplitChoice> {
        let count = fragments.len();
        let total_area: f64 = fragments.iter().map(|f| f.area).sum();
        let mut best: Option<SplitChoice> = None;

        for (k, &n) in self.normals.iter().enumerate() {
            let projected: Vec<Interval> = fragments.iter().map(|f| f.bounds.project(n)).collect();
            let extent = projected
                .iter()
                .fold(Interval::EMPTY, |acc, p| Interval::surrounding(&acc, p));
            if extent.size() <= 2.0 * EPSILON {
                continue;
            }
            let middle = 0.5 * (extent.min + extent.max);

            // (start, width, area) sorted by start, and the same sorted by end
            let mut starts: Vec<(f64, f64, f64)> = projected
                .iter()
                .zip(fragments)
                .map(|(p, f)| (p.min, p.size().max(EPSILON), f.area))
                .collect();
            starts.sort_by(|a, b| a.0.total_cmp(&b.0));
            let mut ends = starts.clone();
            ends.sort_by(|a, b| (a.0 + a.1).total_cmp(&(b.0 + b.1)));

            // Left-only fragments end at or before s, right-only ones start at or after it
            let lowest_end = projected.iter().map(|p| p.max).fold(f64::INFINITY, f64::min);
            let highest_start = projected.iter().map(|p| p.min).fold(f64::NEG_INFINITY, f64::max);

            let mut positions: Vec<f64> = projected
                .iter()
                .flat_map(|p| [p.min, p.max])
                .filter(|&s| s > extent.min + EPSILON && s < extent.max - EPSILON)
                .collect();
            positions.sort_by(f64::total_cmp);
            positions.dedup();

            // Running sums over fragments started (lo < s) and ended (hi <= s)
            let (mut si, mut ei) = (0, 0);
            let (mut started_rate, mut started_offset) = (0.0, 0.0);
            let (mut ended, mut ended_rate, mut ended_offset) = (0.0, 0.0, 0.0);

            for &s in &positions {
                while si < count && starts[si].0 < s {
                    let (lo, width, area) = starts[si];
                    started_rate += area / width;
                    started_offset += area * lo / width;
                    si += 1;
                }
                while ei < count && ends[ei].0 + ends[ei].1 <= s {
                    let (lo, width, area) = ends[ei];
                    ended += area;
                    ended_rate += area / width;
                    ended_offset += area * lo / width;
                    ei += 1;
                }

                // Both children must lose at least one fragment
                if lowest_end > s || highest_start < s {
                    continue;
                }

                // Straddlers contribute linearly in s across their extent
                let partial = s * (started_rate - ended_rate) - (started_offset - ended_offset);
                let left_area = (ended + partial).clamp(0.0, total_area);
                let right_area = total_area - left_area;
                let cost = left_area / (s - extent.min) + right_area / (extent.max - s);

                let candidate = SplitChoice {
                    normal: k,
                    position: s,
                    cost,
                    off_center: (s - middle).abs(),
                };
                if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn partition(&self, fragments: &[Fragment], choice: &SplitChoice) -> (Vec<Fragment>, Vec<Fragment>) {
        let n = self.normals[choice.normal];
        let s = choice.position;
        let mut left = Vec::new();
        let mut right = Vec::new();

        for fragment in fragments {
            let p = fragment.bounds.project(n);
            if p.max <= s {
                left.push(*fragment);
            } else if p.min >= s {
                right.push(*fragment);
            } else {
                left.push(self.clip_fragment(fragment, choice, true));
                right.push(self.clip_fragment(fragment, choice, false));
            }
        }
        (left, right)
    }

    /// The part of a straddling fragment on one side of the split.
    fn clip_fragment(&self, fragment: &Fragment, choice: &SplitChoice, left_side: bool) -> Fragment {
        let n = self.normals[choice.normal];
        let s = choice.position;

        let Some((axis, sign)) = axis_of(n) else {
            let p = fragment.bounds.project(n);
            let below = if p.size() > 0.0 {
                ((s - p.min) / p.size()).clamp(0.0, 1.0)
            } else {
                0.5
            };
            let fraction = if left_side { below } else { 1.0 - below };
            return Fragment {
                area: fragment.area * fraction,
                ..*fragment
            };
        };

        // Projection onto -X is -x, so the left side is above the plane
        let plane = s * sign;
        let lower = left_side == (sign > 0.0);
        let primitive = &self.primitives[fragment.source as usize];

        let surface = primitive.split_at(plane, axis);
        let slab = split_box(&fragment.bounds, plane, axis);
        let (surface, slab) = if lower {
            (surface.below, slab.below)
        } else {
            (surface.above, slab.above)
        };
        let bounds = match (surface, slab) {
            (Some(part), Some(slab)) => {
                let clipped = Aabb::intersection(&part, &slab);
                if clipped.is_empty() {
                    slab
                } else {
                    clipped
                }
            }
            (None, Some(slab)) => slab,
            (_, None) => fragment.bounds,
        };

        let extent = fragment.bounds.axis_interval(axis);
        let (from, to) = if lower {
            (extent.min, plane)
        } else {
            (plane, extent.max)
        };
        let area = (primitive.split_surface_area(to, axis) - primitive.split_surface_area(from, axis))
            .clamp(0.0, fragment.area);

        Fragment {
            source: fragment.source,
            bounds,
            area,
        }
    }
}

impl<'a> PlaneSplitTree<'a> {
    /// Build over `primitives` choosing split normals from `normals`.
    ///
    /// Zero or non-finite normals are ignored; the coordinate axes are used
    /// when none remain.
    pub fn build(
        primitives: &'a [Box<dyn Primitive>],
        normals: &[Vec3],
        max_depth: usize,
        min_items: usize,
    ) -> Self {
        let mut normals: Vec<Vec3> = normals
            .iter()
            .filter_map(|n| n.try_normalize())
            .take(u16::MAX as usize)
            .collect();
        if normals.is_empty() {
            normals = vec![Vec3::X, Vec3::Y, Vec3::Z];
        }

        let bounds = scene_bounds(primitives);
        if primitives.is_empty() || bounds.is_empty() {
            return Self {
                primitives,
                normals,
                bounds: Aabb::EMPTY,
                nodes: Vec::new(),
                references: CompactedReferences::default(),
                leaves: 0,
                depth: 0,
            };
        }

        let fragments = primitives
            .iter()
            .enumerate()
            .map(|(id, p)| Fragment {
                source: id as PrimitiveId,
                bounds: p.bounds(),
                area: p.surface_area(),
            })
            .collect();

        let (nodes, references, leaves, depth) = {
            let mut builder = SplitBuilder {
                primitives,
                normals: &normals,
                max_depth,
                min_items: min_items.max(1),
                nodes: Vec::new(),
                compactor: ReferenceCompactor::new(),
                depth: 0,
            };
            builder.build_node(fragments, 0);
            let leaves = builder.compactor.leaf_count();
            (builder.nodes, builder.compactor.compact(), leaves, builder.depth)
        };

        let mut tree = Self {
            primitives,
            normals,
            bounds: bounds.grow(EPSILON),
            nodes,
            references,
            leaves,
            depth,
        };
        for node in &mut tree.nodes {
            if let SplitNode::Leaf { references } = node {
                *references = tree.references.descriptor(*references as usize);
            }
        }
        tree
    }

    fn traverse(
        &self,
        node: u32,
        ray: &Ray,
        t_min: f64,
        t_max: f64,
        max_distance: f64,
        best: &mut Option<Hit>,
    ) {
        let (normal, left_max, right_min, children) = match self.nodes[node as usize] {
            SplitNode::Leaf { references } => {
                let ids = self.references.resolve(references);
                closest_hit_in(self.primitives, ids.iter().copied(), ray, max_distance, best);
                return;
            }
            SplitNode::Interior {
                normal,
                left_max,
                right_min,
                children,
            } => (normal, left_max, right_min, children),
        };

        let n = self.normals[normal as usize];
        let o = n.dot(ray.origin);
        let d = n.dot(ray.direction);

        if is_near_zero(d) {
            // The projected coordinate barely moves: visit every child whose
            // range it touches over the segment
            let p0 = o + d * t_min;
            let p1 = if t_max.is_finite() { o + d * t_max } else { p0 };
            let (lo, hi) = (p0.min(p1), p0.max(p1));
            if lo <= left_max {
                self.traverse(children[0], ray, t_min, t_max, max_distance, best);
            }
            if hi >= right_min && !best.is_some_and(|hit: Hit| hit.distance < t_min) {
                self.traverse(children[1], ray, t_min, t_max, max_distance, best);
            }
            return;
        }

        // Parameters where the projection reaches each child's bound
        let t_left = (left_max - o) / d;
        let t_right = (right_min - o) / d;
        let (near, far) = if d > 0.0 {
            (
                (children[0], t_min, t_left.min(t_max)),
                (children[1], t_right.max(t_min), t_max),
            )
        } else {
            (
                (children[1], t_min, t_right.min(t_max)),
                (children[0], t_left.max(t_min), t_max),
            )
        };

        if near.1 <= near.2 {
            self.traverse(near.0, ray, near.1, near.2, max_distance, best);
        }
        if far.1 <= far.2 && !best.is_some_and(|hit: Hit| hit.distance < far.1) {
            self.traverse(far.0, ray, far.1, far.2, max_distance, best);
        }
    }
}

impl SpatialIndex for PlaneSplitTree<'_> {
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
            kind: AccelKind::PlaneSplit,
            primitives: self.primitives.len(),
            leaves: self.leaves,
            stored_references: compaction.stored_references,
            raw_references: compaction.raw_references,
            depth: self.depth,
        }
    }
}
