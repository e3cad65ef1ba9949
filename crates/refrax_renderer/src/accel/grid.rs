//! Uniform grid walked front-to-back with a 3D DDA.

use refrax_core::{Primitive, PrimitiveId};
use refrax_math::{is_near_zero, Aabb, Interval, Ray, Vec3, EPSILON};

use super::{closest_hit_in, scene_bounds, AccelKind, Hit, IndexStats, SpatialIndex};
use crate::compact::{CompactedReferences, ReferenceCompactor};

/// Upper bound on cells along one axis.
const MAX_RESOLUTION: usize = 128;

/// Upper bound on the total cell count.
const MAX_CELLS: usize = 1 << 22;

/// Grid-line crossing cursor for one axis.
#[derive(Debug, Clone, Copy)]
struct Migration {
    /// Ray parameter of the next crossing
    t: f64,
    /// Parameter distance between consecutive crossings
    delta: f64,
    step: isize,
}

impl Migration {
    const STILL: Migration = Migration {
        t: f64::INFINITY,
        delta: f64::INFINITY,
        step: 0,
    };
}

/// Axis whose cursor crosses next; lowest axis on ties.
#[inline]
fn next_migration(cursors: &[Migration; 3]) -> usize {
    let mut axis = 0;
    for candidate in 1..3 {
        if cursors[candidate].t < cursors[axis].t {
            axis = candidate;
        }
    }
    axis
}

/// Primitives bucketed into equally sized cells.
pub struct UniformGrid<'a> {
    primitives: &'a [Box<dyn Primitive>],
    bounds: Aabb,
    resolution: [usize; 3],
    cell_size: Vec3,
    /// One packed reference range per cell, x fastest
    cells: Vec<u64>,
    references: CompactedReferences,
}

impl<'a> UniformGrid<'a> {
    /// Build a grid with roughly `density` primitives per cell.
    pub fn build(primitives: &'a [Box<dyn Primitive>], density: f64) -> Self {
        let mut grid = Self {
            primitives,
            bounds: Aabb::EMPTY,
            resolution: [0; 3],
            cell_size: Vec3::ZERO,
            cells: Vec::new(),
            references: CompactedReferences::default(),
        };
        let bounds = scene_bounds(primitives);
        if primitives.is_empty() || bounds.is_empty() {
            return grid;
        }

        grid.bounds = bounds.grow(EPSILON);
        grid.resolution = resolution_for(&grid.bounds, primitives.len(), density);
        let size = grid.bounds.size();
        grid.cell_size = Vec3::new(
            size.x / grid.resolution[0] as f64,
            size.y / grid.resolution[1] as f64,
            size.z / grid.resolution[2] as f64,
        );

        let total = grid.resolution.iter().product();
        let mut lists: Vec<Vec<PrimitiveId>> = vec![Vec::new(); total];
        for (id, primitive) in primitives.iter().enumerate() {
            let b = primitive.bounds();
            let lo = grid.cell_of(b.min());
            let hi = grid.cell_of(b.max());
            for z in lo[2]..=hi[2] {
                for y in lo[1]..=hi[1] {
                    for x in lo[0]..=hi[0] {
                        let cell = [x, y, z];
                        if primitive.overlaps(&grid.cell_bounds(cell).grow(EPSILON)) {
                            lists[grid.flat_index(cell)].push(id as PrimitiveId);
                        }
                    }
                }
            }
        }

        let mut compactor = ReferenceCompactor::new();
        for list in lists {
            compactor.add_leaf(list);
        }
        grid.references = compactor.compact();
        grid.cells = (0..total).map(|i| grid.references.descriptor(i)).collect();
        grid
    }

    pub fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    #[inline]
    fn flat_index(&self, cell: [usize; 3]) -> usize {
        cell[0] + self.resolution[0] * (cell[1] + self.resolution[1] * cell[2])
    }

    fn axis_cell(&self, p: Vec3, axis: usize) -> usize {
        let min = self.bounds.min();
        let c = ((p[axis] - min[axis]) / self.cell_size[axis]).floor();
        (c.max(0.0) as usize).min(self.resolution[axis] - 1)
    }

    /// Cell containing `p`, clamped to the grid.
    fn cell_of(&self, p: Vec3) -> [usize; 3] {
        [
            self.axis_cell(p, 0),
            self.axis_cell(p, 1),
            self.axis_cell(p, 2),
        ]
    }

    fn cell_bounds(&self, cell: [usize; 3]) -> Aabb {
        let origin = self.bounds.min();
        let mut min = Vec3::ZERO;
        let mut max = Vec3::ZERO;
        for axis in 0..3 {
            min[axis] = origin[axis] + cell[axis] as f64 * self.cell_size[axis];
            max[axis] = if cell[axis] + 1 == self.resolution[axis] {
                self.bounds.max()[axis]
            } else {
                origin[axis] + (cell[axis] + 1) as f64 * self.cell_size[axis]
            };
        }
        Aabb::exact(min, max)
    }
}

/// Cells per axis so the total is about `density` times the primitive count.
fn resolution_for(bounds: &Aabb, count: usize, density: f64) -> [usize; 3] {
    let size = bounds.size();
    let volume = bounds.volume().max(f64::MIN_POSITIVE);
    let density = if density.is_finite() && density > 0.0 {
        density
    } else {
        1.0
    };
    let mut per_unit = (density * count as f64 / volume).cbrt();

    let mut resolution = [1usize; 3];
    loop {
        let mut clamped = false;
        for axis in 0..3 {
            let wanted = (size[axis] * per_unit).ceil();
            resolution[axis] = if wanted > MAX_RESOLUTION as f64 {
                clamped = true;
                MAX_RESOLUTION
            } else {
                (wanted as usize).max(1)
            };
        }
        if clamped {
            log::warn!(
                "Grid resolution clamped to {:?} ({} per axis maximum)",
                resolution,
                MAX_RESOLUTION
            );
        }

        let total: usize = resolution.iter().product();
        if total <= MAX_CELLS {
            return resolution;
        }
        per_unit *= (MAX_CELLS as f64 / total as f64).cbrt() * 0.99;
    }
}

impl SpatialIndex for UniformGrid<'_> {
    fn calculate_hit(&self, ray: &Ray, max_distance: f64) -> Option<Hit> {
        if self.cells.is_empty() {
            return None;
        }
        let range = self.bounds.clip(ray, Interval::new(0.0, max_distance))?;
        let entry = ray.at(range.min);

        let mut cell = [0isize; 3];
        let mut cursors = [Migration::STILL; 3];
        for axis in 0..3 {
            let c = self.axis_cell(entry, axis);
            cell[axis] = c as isize;

            let d = ray.direction[axis];
            if is_near_zero(d) {
                continue;
            }
            let upper = if d > 0.0 { c + 1 } else { c };
            let boundary = self.bounds.min()[axis] + upper as f64 * self.cell_size[axis];
            cursors[axis] = Migration {
                t: (boundary - ray.origin[axis]) / d,
                delta: self.cell_size[axis] / d.abs(),
                step: if d > 0.0 { 1 } else { -1 },
            };
        }

        let mut best = None;
        loop {
            let flat = self.flat_index([cell[0] as usize, cell[1] as usize, cell[2] as usize]);
            let ids = self.references.resolve(self.cells[flat]);
            closest_hit_in(self.primitives, ids.iter().copied(), ray, max_distance, &mut best);

            let axis = next_migration(&cursors);
            let next = cursors[axis];
            if next.step == 0 || next.t > range.max {
                return best;
            }
            if best.is_some_and(|hit: Hit| hit.distance < next.t) {
                return best;
            }

            cell[axis] += next.step;
            if cell[axis] < 0 || cell[axis] >= self.resolution[axis] as isize {
                return best;
            }
            cursors[axis].t += next.delta;
        }
    }

    fn stats(&self) -> IndexStats {
        let compaction = self.references.stats();
        IndexStats {
            kind: AccelKind::Grid,
            primitives: self.primitives.len(),
            leaves: self.cells.len(),
            stored_references: compaction.stored_references,
            raw_references: compaction.raw_references,
            depth: 1,
        }
    }
}
