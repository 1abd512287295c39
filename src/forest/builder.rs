//! Recursive 2-means tree construction, one tree per `rayon` task.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::Result;
use crate::forest::node::{ForestNode, NodeId};
use crate::numerics::{dot, euclidean_similarity, kmeans};

/// Builds `n_trees` independent trees over `items` and returns a single
/// merged arena plus one root [`NodeId`] per tree.
///
/// Each tree is built into its own local arena on its own `rayon` task, from
/// its own seed drawn sequentially off `rng` before the parallel section
/// starts (so the sequence of per-tree seeds, and therefore the whole
/// forest, is reproducible whenever `rng` is reproducible). Arenas are
/// concatenated and rebased only after every task has joined, so the merged
/// arena handed back to the caller is the first point at which any
/// cross-tree state exists.
pub fn build_forest<R: Rng>(
    item_ids: &[u32],
    items: &[Vec<f64>],
    k: usize,
    n_trees: usize,
    rng: &mut R,
) -> Result<(Vec<ForestNode>, Vec<NodeId>)> {
    let tree_seeds: Vec<u64> = (0..n_trees).map(|_| rng.gen()).collect();

    let built: Vec<Result<(Vec<ForestNode>, NodeId)>> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut tree_rng = StdRng::seed_from_u64(seed);
            let mut arena = Vec::new();
            let root = build_tree(&mut arena, item_ids.to_vec(), items, k, &mut tree_rng)?;
            Ok((arena, root))
        })
        .collect();

    let mut nodes = Vec::new();
    let mut roots = Vec::with_capacity(n_trees);
    for result in built {
        let (local_arena, local_root) = result?;
        let offset = nodes.len() as u32;
        nodes.extend(local_arena.into_iter().map(|node| node.rebase(offset)));
        roots.push(local_root.offset_by(offset));
    }

    Ok((nodes, roots))
}

fn push_leaf(arena: &mut Vec<ForestNode>, items: Vec<u32>) -> NodeId {
    let id = NodeId(arena.len() as u32);
    arena.push(ForestNode::Leaf { items });
    id
}

fn build_tree<R: Rng>(
    arena: &mut Vec<ForestNode>,
    item_ids: Vec<u32>,
    items: &[Vec<f64>],
    k: usize,
    rng: &mut R,
) -> Result<NodeId> {
    if item_ids.len() <= k {
        return Ok(push_leaf(arena, item_ids));
    }

    let vectors: Vec<Vec<f64>> = item_ids.iter().map(|&id| items[id as usize].clone()).collect();
    let centroids = kmeans(rng, &vectors, 2, 200, |a, b| euclidean_similarity(a, b))?;
    let split: Vec<f64> =
        centroids[0].iter().zip(&centroids[1]).map(|(a, b)| a - b).collect();

    let mut left_ids = Vec::new();
    let mut right_ids = Vec::new();
    for &id in &item_ids {
        if dot(&items[id as usize], &split)? > 0.0 {
            right_ids.push(id);
        } else {
            left_ids.push(id);
        }
    }

    if left_ids.len() <= k || right_ids.len() <= k {
        return Ok(push_leaf(arena, item_ids));
    }

    let left = build_tree(arena, left_ids, items, k, rng)?;
    let right = build_tree(arena, right_ids, items, k, rng)?;

    let id = NodeId(arena.len() as u32);
    arena.push(ForestNode::Internal { split, left, right });
    Ok(id)
}
