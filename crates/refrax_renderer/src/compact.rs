//! Reference compaction for spatial index leaves.
//!
//! Every index distributes primitive ids into per-leaf lists while it is
//! built. Many of those lists are identical (neighbouring grid cells around
//! a large primitive) or overlap heavily. The compactor stores all of them
//! in one shared array, merging pairs of overlapping lists into blocks laid
//! out as `only A | A and B | only B` so both read a contiguous run, and
//! hands every leaf a single packed `u64` range descriptor.

use std::collections::{BTreeSet, HashMap};

use refrax_core::PrimitiveId;

/// Posting lists longer than this are skipped when looking for merge
/// partners. Ids shared by that many leaves are usually one huge primitive.
const MAX_POSTING_SCAN: usize = 64;

/// When no partner turns up through the postings, this many unplaced lists
/// are compared directly, in pairing order.
const MAX_LINEAR_SCAN: usize = 256;

/// Pack a `[start, end)` range into one machine word.
#[inline]
pub fn pack_range(start: u32, end: u32) -> u64 {
    ((end as u64) << 32) | start as u64
}

/// Inverse of [`pack_range`]: returns `(start, end)`.
#[inline]
pub fn unpack_range(descriptor: u64) -> (u32, u32) {
    (descriptor as u32, (descriptor >> 32) as u32)
}

/// Number of ids present in both sorted, deduplicated lists.
pub fn common_count(a: &[PrimitiveId], b: &[PrimitiveId]) -> usize {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

/// Merge two sorted lists into `(only_a, both, only_b)`.
pub fn split_merge(
    a: &[PrimitiveId],
    b: &[PrimitiveId],
) -> (Vec<PrimitiveId>, Vec<PrimitiveId>, Vec<PrimitiveId>) {
    let (mut only_a, mut both, mut only_b) = (Vec::new(), Vec::new(), Vec::new());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                only_a.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                only_b.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                both.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    only_a.extend_from_slice(&a[i..]);
    only_b.extend_from_slice(&b[j..]);
    (only_a, both, only_b)
}

/// Position of `needle` as a contiguous run inside `haystack`.
fn find_run(haystack: &[PrimitiveId], needle: &[PrimitiveId]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// A distinct leaf list, shared by every leaf with the same content.
#[derive(Debug)]
struct SubList {
    /// Sorted, deduplicated ids
    items: Vec<PrimitiveId>,
    /// How many leaves use this list
    frequency: u32,
    /// `(offset, count)` in the shared array once placed
    placement: Option<(u32, u32)>,
}

/// A run of the shared array together with the lists that read from it.
struct Block {
    items: Vec<PrimitiveId>,
    /// `(list, start within block, count)`
    members: Vec<(usize, u32, u32)>,
}

/// Size figures for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    pub leaves: usize,
    pub distinct_lists: usize,
    /// Sum of all leaf list lengths after deduplication
    pub raw_references: usize,
    /// Length of the shared array
    pub stored_references: usize,
}

/// Collects leaf lists during an index build.
#[derive(Debug, Default)]
pub struct ReferenceCompactor {
    /// Arena of distinct lists
    lists: Vec<SubList>,
    /// Arena index of the representative list for every leaf
    leaves: Vec<usize>,
    lookup: HashMap<Vec<PrimitiveId>, usize>,
    raw_references: usize,
}

impl ReferenceCompactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the ids of one leaf and return the leaf's index.
    ///
    /// Order and duplicates in `items` do not matter.
    pub fn add_leaf(&mut self, mut items: Vec<PrimitiveId>) -> usize {
        items.sort_unstable();
        items.dedup();
        self.raw_references += items.len();

        let list = match self.lookup.get(&items) {
            Some(&existing) => {
                self.lists[existing].frequency += 1;
                existing
            }
            None => {
                let index = self.lists.len();
                self.lookup.insert(items.clone(), index);
                self.lists.push(SubList {
                    items,
                    frequency: 1,
                    placement: None,
                });
                index
            }
        };

        self.leaves.push(list);
        self.leaves.len() - 1
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Lay out every list in one shared array.
    pub fn compact(mut self) -> CompactedReferences {
        let mut items: Vec<PrimitiveId> = Vec::with_capacity(self.raw_references);

        for list in self.lists.iter_mut().filter(|l| l.items.is_empty()) {
            list.placement = Some((0, 0));
        }

        // Lists of two or more ids go through greedy pairing, most shared first
        let mut multi: Vec<usize> = (0..self.lists.len())
            .filter(|&i| self.lists[i].items.len() > 1)
            .collect();
        multi.sort_by(|&a, &b| {
            let (la, lb) = (&self.lists[a], &self.lists[b]);
            lb.frequency
                .cmp(&la.frequency)
                .then(lb.items.len().cmp(&la.items.len()))
                .then(a.cmp(&b))
        });

        let mut postings: HashMap<PrimitiveId, Vec<usize>> = HashMap::new();
        for &list in &multi {
            for &id in &self.lists[list].items {
                postings.entry(id).or_default().push(list);
            }
        }

        let mut placed = vec![false; self.lists.len()];
        for &a in &multi {
            if placed[a] {
                continue;
            }
            placed[a] = true;

            let block = self.build_block(a, &multi, &postings, &mut placed);
            let base = items.len() as u32;
            for &(list, start, count) in &block.members {
                self.lists[list].placement = Some((base + start, count));
            }
            items.extend_from_slice(&block.items);
        }

        // Singletons reuse any existing copy of their id
        let mut first_position: HashMap<PrimitiveId, u32> = HashMap::new();
        for (pos, &id) in items.iter().enumerate() {
            first_position.entry(id).or_insert(pos as u32);
        }
        for list in self.lists.iter_mut().filter(|l| l.items.len() == 1) {
            let id = list.items[0];
            let offset = *first_position.entry(id).or_insert_with(|| {
                items.push(id);
                (items.len() - 1) as u32
            });
            list.placement = Some((offset, 1));
        }

        let ranges = self
            .leaves
            .iter()
            .map(|&list| {
                let (offset, count) = self.lists[list].placement.unwrap_or((0, 0));
                pack_range(offset, offset + count)
            })
            .collect();

        let stats = CompactionStats {
            leaves: self.leaves.len(),
            distinct_lists: self.lists.len(),
            raw_references: self
                .leaves
                .iter()
                .map(|&l| self.lists[l].items.len())
                .sum(),
            stored_references: items.len(),
        };
        log::debug!(
            "Compacted {} leaves ({} distinct lists): {} references stored for {} requested",
            stats.leaves,
            stats.distinct_lists,
            stats.stored_references,
            stats.raw_references
        );

        CompactedReferences {
            items,
            ranges,
            stats,
        }
    }

    /// Pair list `a` with its best unplaced partner and fold in every other
    /// unplaced list that already appears as a run of the result.
    fn build_block(
        &self,
        a: usize,
        order: &[usize],
        postings: &HashMap<PrimitiveId, Vec<usize>>,
        placed: &mut [bool],
    ) -> Block {
        let list_a = &self.lists[a].items;

        let partner = self
            .best_partner(list_a, self.candidates(list_a, postings, placed))
            .or_else(|| {
                // Ids behind skipped postings can still be shared
                let nearby = order
                    .iter()
                    .copied()
                    .filter(|&b| !placed[b])
                    .take(MAX_LINEAR_SCAN);
                self.best_partner(list_a, nearby)
            });

        let mut block = match partner {
            Some(b) => {
                placed[b] = true;
                let list_b = &self.lists[b].items;
                let (only_a, both, only_b) = split_merge(list_a, list_b);
                let b_start = only_a.len() as u32;
                let mut items = only_a;
                items.extend_from_slice(&both);
                items.extend_from_slice(&only_b);
                Block {
                    items,
                    members: vec![
                        (a, 0, list_a.len() as u32),
                        (b, b_start, list_b.len() as u32),
                    ],
                }
            }
            None => Block {
                items: list_a.clone(),
                members: vec![(a, 0, list_a.len() as u32)],
            },
        };

        for c in self.candidates(&block.items, postings, placed) {
            let list_c = &self.lists[c].items;
            if let Some(start) = find_run(&block.items, list_c) {
                placed[c] = true;
                block.members.push((c, start as u32, list_c.len() as u32));
            }
        }

        block
    }

    /// Candidate with the highest overlap with `list_a`, lowest index on ties.
    fn best_partner(
        &self,
        list_a: &[PrimitiveId],
        candidates: impl IntoIterator<Item = usize>,
    ) -> Option<usize> {
        candidates
            .into_iter()
            .map(|b| (b, common_count(list_a, &self.lists[b].items)))
            .filter(|&(_, common)| common > 0)
            .max_by(|x, y| x.1.cmp(&y.1).then(y.0.cmp(&x.0)))
            .map(|(b, _)| b)
    }

    /// Unplaced lists sharing at least one id with `items`, in index order.
    fn candidates(
        &self,
        items: &[PrimitiveId],
        postings: &HashMap<PrimitiveId, Vec<usize>>,
        placed: &[bool],
    ) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        for id in items {
            let Some(lists) = postings.get(id) else {
                continue;
            };
            if lists.len() > MAX_POSTING_SCAN {
                continue;
            }
            out.extend(lists.iter().copied().filter(|&l| !placed[l]));
        }
        out
    }
}

/// The shared reference array plus one packed range per leaf.
#[derive(Debug, Clone, Default)]
pub struct CompactedReferences {
    items: Vec<PrimitiveId>,
    ranges: Vec<u64>,
    stats: CompactionStats,
}

impl CompactedReferences {
    pub fn items(&self) -> &[PrimitiveId] {
        &self.items
    }

    pub fn leaf_count(&self) -> usize {
        self.ranges.len()
    }

    /// Packed descriptor of a leaf, as returned by [`ReferenceCompactor::add_leaf`].
    pub fn descriptor(&self, leaf: usize) -> u64 {
        self.ranges[leaf]
    }

    /// The ids referenced by a packed descriptor.
    #[inline]
    pub fn resolve(&self, descriptor: u64) -> &[PrimitiveId] {
        let (start, end) = unpack_range(descriptor);
        &self.items[start as usize..end as usize]
    }

    pub fn leaf(&self, leaf: usize) -> &[PrimitiveId] {
        self.resolve(self.ranges[leaf])
    }

    pub fn stats(&self) -> CompactionStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn as_set(items: &[PrimitiveId]) -> Vec<PrimitiveId> {
        let mut v = items.to_vec();
        v.sort_unstable();
        v
    }

    /// Every leaf must read back exactly its own id set, without duplicates.
    fn assert_round_trip(input: &[Vec<PrimitiveId>]) -> CompactedReferences {
        let mut compactor = ReferenceCompactor::new();
        for list in input {
            compactor.add_leaf(list.clone());
        }
        let compacted = compactor.compact();

        assert_eq!(compacted.leaf_count(), input.len());
        for (leaf, list) in input.iter().enumerate() {
            let mut expected = list.clone();
            expected.sort_unstable();
            expected.dedup();
            let got = compacted.leaf(leaf);
            assert_eq!(as_set(got), expected, "leaf {leaf} decoded wrongly");
        }
        compacted
    }

    #[test]
    fn test_pack_unpack() {
        let d = pack_range(7, 12);
        assert_eq!(d, (12u64 << 32) | 7);
        assert_eq!(unpack_range(d), (7, 12));
        assert_eq!(unpack_range(pack_range(0, u32::MAX)), (0, u32::MAX));
    }

    #[test]
    fn test_common_count_and_split_merge() {
        let a = [1, 3, 5, 7];
        let b = [3, 4, 5, 8];
        assert_eq!(common_count(&a, &b), 2);
        assert_eq!(common_count(&b, &a), 2);

        let (only_a, both, only_b) = split_merge(&a, &b);
        assert_eq!(only_a, vec![1, 7]);
        assert_eq!(both, vec![3, 5]);
        assert_eq!(only_b, vec![4, 8]);
    }

    #[test]
    fn test_disjoint_lists() {
        let compacted = assert_round_trip(&[vec![0, 1], vec![2, 3], vec![4, 5, 6]]);
        assert_eq!(compacted.stats().stored_references, 7);
    }

    #[test]
    fn test_identical_lists_share_storage() {
        let compacted = assert_round_trip(&[vec![3, 1, 2], vec![1, 2, 3], vec![2, 3, 1, 1]]);
        assert_eq!(compacted.items().len(), 3);
        assert_eq!(compacted.stats().distinct_lists, 1);
        assert_eq!(compacted.descriptor(0), compacted.descriptor(2));
    }

    #[test]
    fn test_overlapping_pair_merges() {
        let compacted = assert_round_trip(&[vec![1, 2, 3, 4], vec![3, 4, 5, 6]]);
        // only A | both | only B
        assert_eq!(compacted.items(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_sub_run_folds_in() {
        // [3, 4] is the shared middle of the first two lists
        let compacted = assert_round_trip(&[vec![1, 2, 3, 4], vec![3, 4, 5, 6], vec![3, 4]]);
        assert_eq!(compacted.items().len(), 6);
    }

    #[test]
    fn test_singletons_and_empty() {
        let compacted = assert_round_trip(&[vec![], vec![5], vec![5, 6], vec![9], vec![], vec![6]]);
        // 5 and 6 reuse the pair's storage, 9 is appended once
        assert_eq!(compacted.items().len(), 3);
        assert!(compacted.leaf(0).is_empty());
        assert!(compacted.leaf(4).is_empty());
    }

    #[test]
    fn test_no_leaves() {
        let compacted = ReferenceCompactor::new().compact();
        assert_eq!(compacted.leaf_count(), 0);
        assert!(compacted.items().is_empty());
    }

    #[test]
    fn test_random_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let leaves = rng.gen_range(1..120);
            let input: Vec<Vec<PrimitiveId>> = (0..leaves)
                .map(|_| {
                    let len = rng.gen_range(0..12);
                    (0..len).map(|_| rng.gen_range(0..40)).collect()
                })
                .collect();
            let compacted = assert_round_trip(&input);
            let stats = compacted.stats();
            assert!(stats.stored_references <= stats.raw_references);
        }
    }

    #[test]
    fn test_grid_like_neighbourhoods() {
        // A strip of cells where each primitive spans three neighbours
        let input: Vec<Vec<PrimitiveId>> = (0..50u32)
            .map(|cell| (cell.saturating_sub(2)..=cell).collect())
            .collect();
        let compacted = assert_round_trip(&input);
        assert!(compacted.stats().stored_references < compacted.stats().raw_references);
    }

    #[test]
    fn test_widely_shared_ids_still_merge() {
        // Ids 0 and 1 appear in more leaves than the postings scan allows
        let input: Vec<Vec<PrimitiveId>> = (0..100u32).map(|i| vec![0, 1, 100 + i]).collect();
        let compacted = assert_round_trip(&input);
        let stats = compacted.stats();
        assert_eq!(stats.raw_references, 300);
        // Fifty pairs of `x | 0 1 | y`
        assert_eq!(stats.stored_references, 200);
    }
}
