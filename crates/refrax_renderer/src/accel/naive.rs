//! Linear scan over every primitive.

use refrax_core::{Primitive, PrimitiveId};
use refrax_math::Ray;

use super::{closest_hit_in, AccelKind, Hit, IndexStats, SpatialIndex};

/// Tests every primitive for every ray. Reference for the real indexes.
pub struct NaiveIndex<'a> {
    primitives: &'a [Box<dyn Primitive>],
}

impl<'a> NaiveIndex<'a> {
    pub fn new(primitives: &'a [Box<dyn Primitive>]) -> Self {
        Self { primitives }
    }
}

impl SpatialIndex for NaiveIndex<'_> {
    fn calculate_hit(&self, ray: &Ray, max_distance: f64) -> Option<Hit> {
        let mut best = None;
        closest_hit_in(
            self.primitives,
            0..self.primitives.len() as PrimitiveId,
            ray,
            max_distance,
            &mut best,
        );
        best
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            kind: AccelKind::Naive,
            primitives: self.primitives.len(),
            leaves: 1,
            stored_references: self.primitives.len(),
            raw_references: self.primitives.len(),
            depth: 0,
        }
    }
}
