//! The public forest index: owns the items and the merged node arena, and
//! answers nearest-neighbor queries over them.

use std::collections::HashSet;

use rand::Rng;

use crate::error::{Error, Result};
use crate::forest::builder::build_forest;
use crate::forest::node::{ForestNode, NodeId};
use crate::numerics::{cosine_distance, dot};
use crate::priority_queue::PriorityQueue;

/// A random-projection forest: an ensemble of binary trees grown by
/// repeated 2-means splits, queried with a best-first priority traversal.
///
/// Construct once with [`ForestIndex::build`] (or [`ForestIndex::build_with_rng`]
/// for a reproducible run), then query many times with
/// [`ForestIndex::find_similar_by_vector`] or [`ForestIndex::find_similar_by_id`].
/// There is no mutation after construction.
#[derive(Debug)]
pub struct ForestIndex {
    dimensions: usize,
    items: Vec<Vec<f64>>,
    nodes: Vec<ForestNode>,
    roots: Vec<NodeId>,
}

impl ForestIndex {
    /// Builds a forest of `n_trees` trees with leaf capacity `k`, seeding
    /// every split from OS randomness.
    pub fn build(
        raw_data: &[Vec<f64>],
        dimensions: usize,
        n_trees: usize,
        k: usize,
    ) -> Result<ForestIndex> {
        let mut rng = rand::thread_rng();
        Self::build_with_rng(raw_data, dimensions, n_trees, k, &mut rng)
    }

    /// Builds a forest exactly as [`ForestIndex::build`] does, but drawing
    /// all randomness from the caller-supplied `rng`. Two calls with
    /// identically-seeded `rng`s over the same data produce identical
    /// forests; this is the seed hook the worked capitals scenario relies
    /// on to be reproducible.
    pub fn build_with_rng<R: Rng>(
        raw_data: &[Vec<f64>],
        dimensions: usize,
        n_trees: usize,
        k: usize,
        rng: &mut R,
    ) -> Result<ForestIndex> {
        if raw_data.is_empty() {
            return Err(Error::EmptyVector);
        }
        for row in raw_data {
            if row.len() != dimensions {
                return Err(Error::DimensionMismatch { expected: dimensions, received: row.len() });
            }
        }

        tracing::debug!(
            n_items = raw_data.len(),
            dimensions,
            n_trees,
            k,
            "building forest"
        );

        let items: Vec<Vec<f64>> = raw_data.to_vec();
        let item_ids: Vec<u32> = (0..items.len() as u32).collect();
        let (nodes, roots) = build_forest(&item_ids, &items, k, n_trees, rng)?;

        tracing::debug!(n_nodes = nodes.len(), n_trees = roots.len(), "forest built");

        Ok(ForestIndex { dimensions, items, nodes, roots })
    }

    /// Returns the shared vector dimensionality of this index.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Returns the number of items indexed.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the vector stored for `id`, if any.
    pub fn item_vector(&self, id: u32) -> Option<&[f64]> {
        self.items.get(id as usize).map(Vec::as_slice)
    }

    /// Finds up to `k_ret` items most similar to the item already indexed
    /// under `id`, under cosine distance.
    pub fn find_similar_by_id(&self, id: u32, k_ret: usize, bucket_scale: f64) -> Result<Vec<u32>> {
        let vector = self.items.get(id as usize).ok_or(Error::UnknownId(id))?;
        self.find_similar_by_vector(vector, k_ret, bucket_scale)
    }

    /// Finds up to `k_ret` items most similar to `v`, under cosine distance.
    ///
    /// Gathers candidates by a best-first traversal of all `T` trees until
    /// the candidate set reaches `floor(k_ret * bucket_scale)` entries or
    /// the traversal queue is exhausted, then re-ranks the candidates by
    /// exact cosine distance to `v` and returns the closest `k_ret`.
    pub fn find_similar_by_vector(
        &self,
        v: &[f64],
        k_ret: usize,
        bucket_scale: f64,
    ) -> Result<Vec<u32>> {
        if v.len() != self.dimensions {
            return Err(Error::DimensionMismatch { expected: self.dimensions, received: v.len() });
        }

        let bucket_size = ((k_ret as f64) * bucket_scale).floor() as usize;
        tracing::trace!(k_ret, bucket_scale, bucket_size, "forest query starting");

        let mut queue = PriorityQueue::with_capacity(self.roots.len());
        for &root in &self.roots {
            queue.push(root, f64::NEG_INFINITY);
        }

        let mut seen = HashSet::new();
        let mut candidates: Vec<u32> = Vec::new();

        while !queue.is_empty() && candidates.len() < bucket_size {
            let (node_id, priority) = queue.pop().expect("queue checked non-empty above");
            let node = self
                .nodes
                .get(node_id.0 as usize)
                .ok_or(Error::InvalidNodeHandle(node_id))?;

            match node {
                ForestNode::Leaf { items } => {
                    for &id in items {
                        if seen.insert(id) {
                            candidates.push(id);
                        }
                    }
                }
                ForestNode::Internal { split, left, right } => {
                    let dp = dot(split, v)?;
                    queue.push(*left, priority.max(dp));
                    queue.push(*right, priority.max(-dp));
                }
            }
        }

        let mut with_distance: Vec<(u32, f64)> = Vec::with_capacity(candidates.len());
        for id in candidates {
            let distance = cosine_distance(&self.items[id as usize], v)?;
            with_distance.push((id, distance));
        }

        let mut result = self.sort_candidates(&with_distance);
        result.truncate(k_ret);

        tracing::debug!(
            candidates = with_distance.len(),
            returned = result.len(),
            "forest query finished"
        );

        Ok(result)
    }

    /// Returns the ids of `id_to_distance` sorted by ascending distance.
    ///
    /// The sort is stable: ids with equal distance keep their relative
    /// order from the input slice.
    pub fn sort_candidates(&self, id_to_distance: &[(u32, f64)]) -> Vec<u32> {
        sort_candidates(id_to_distance)
    }
}

/// Free-standing form of [`ForestIndex::sort_candidates`], usable without
/// an index at hand (for example directly against the worked scenario).
pub fn sort_candidates(id_to_distance: &[(u32, f64)]) -> Vec<u32> {
    let mut candidates = id_to_distance.to_vec();
    candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    candidates.into_iter().map(|(id, _)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn sort_candidates_matches_fixture() {
        let input = vec![(0, 10.0), (1, 5.0), (2, 1.0), (3, 0.0)];
        assert_eq!(sort_candidates(&input), vec![3, 2, 1, 0]);
    }

    #[test]
    fn sort_candidates_is_stable_on_ties() {
        let input = vec![(0, 1.0), (1, 1.0), (2, 0.5)];
        assert_eq!(sort_candidates(&input), vec![2, 0, 1]);
    }

    #[test]
    fn build_rejects_empty_dataset() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = ForestIndex::build_with_rng(&[], 2, 1, 1, &mut rng).unwrap_err();
        assert!(matches!(err, Error::EmptyVector));
    }

    #[test]
    fn build_rejects_dimension_mismatch() {
        let data = vec![vec![1.0, 2.0], vec![1.0, 2.0, 3.0]];
        let mut rng = StdRng::seed_from_u64(1);
        let err = ForestIndex::build_with_rng(&data, 2, 1, 1, &mut rng).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn query_rejects_wrong_dimension_vector() {
        let data = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0], vec![-1.0, -1.0]];
        let mut rng = StdRng::seed_from_u64(7);
        let index = ForestIndex::build_with_rng(&data, 2, 4, 1, &mut rng).unwrap();
        let err = index.find_similar_by_vector(&[1.0, 2.0, 3.0], 2, 5.0).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn find_similar_by_id_rejects_unknown_id() {
        let data = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0], vec![-1.0, -1.0]];
        let mut rng = StdRng::seed_from_u64(7);
        let index = ForestIndex::build_with_rng(&data, 2, 4, 1, &mut rng).unwrap();
        let err = index.find_similar_by_id(99, 2, 5.0).unwrap_err();
        assert!(matches!(err, Error::UnknownId(99)));
    }

    #[test]
    fn self_identity_holds_with_generous_bucket_scale() {
        let data: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i as f64).sin(), (i as f64).cos(), i as f64 / 7.0])
            .collect();
        let mut rng = StdRng::seed_from_u64(99);
        let index = ForestIndex::build_with_rng(&data, 3, 12, 4, &mut rng).unwrap();

        for (id, vector) in data.iter().enumerate() {
            let result = index.find_similar_by_vector(vector, 5, 20.0).unwrap();
            assert!(result.len() <= 5, "bounded output");
            assert!(
                result.contains(&(id as u32)),
                "query vector identical to item {id} should retrieve itself"
            );
            for &returned in &result {
                assert_eq!(index.item_vector(returned).unwrap().len(), 3, "dimensional closure");
            }
        }
    }

    #[test]
    fn bounded_output_respects_k_ret_even_with_huge_bucket_scale() {
        let data: Vec<Vec<f64>> =
            (0..30).map(|i| vec![i as f64, (30 - i) as f64]).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let index = ForestIndex::build_with_rng(&data, 2, 8, 3, &mut rng).unwrap();
        let result = index.find_similar_by_vector(&[15.0, 15.0], 4, 1000.0).unwrap();
        assert!(result.len() <= 4);
    }
}
