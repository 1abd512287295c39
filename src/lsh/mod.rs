//! A locality-sensitive hashing index: signed random projections group
//! vectors into buckets, and a query expands outward from the query's own
//! bucket by Hamming distance.

use std::cmp::Ordering;
use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::numerics::cosine;

/// A signed-random-projection LSH table.
///
/// Keys are opaque to the index (`K` is never inspected, only stored and
/// handed back), matching the "keys are opaque" contract: callers typically
/// key by an item id, a document id, or anything else cheap to clone.
///
/// Construct with [`LshIndex::new`], populate the projections with
/// [`LshIndex::init`], then insert vectors and query by Hamming-ball
/// expansion around a query signature.
#[derive(Debug, Clone)]
pub struct LshIndex<K> {
    seed: u64,
    bits: u32,
    projections: Vec<Vec<f64>>,
    table: HashMap<i64, Vec<K>>,
}

impl<K: Clone> LshIndex<K> {
    /// Creates an index with no projections yet; call [`LshIndex::init`]
    /// before inserting or querying anything.
    ///
    /// `bits` is the declared bit width used for bucket-key arithmetic and
    /// radius enumeration; it must be at most 63 so signatures fit a signed
    /// 64-bit integer.
    pub fn new(seed: u64, bits: u32) -> LshIndex<K> {
        assert!(bits as usize <= 63, "bit width must fit a signed 64-bit signature");
        LshIndex { seed, bits, projections: Vec::new(), table: HashMap::new() }
    }

    /// Populates `splits` random projection vectors of length `dimensions`,
    /// each component drawn uniformly from `[min, max]`, deterministically
    /// from this index's seed.
    ///
    /// A well-formed configuration sets `splits == bits` (one projection
    /// per signature bit); `encode` tolerates `splits > bits` or a query
    /// vector shorter than `splits`, using only as many projections as the
    /// vector has components, for compatibility with the source this
    /// crate's algorithms are grounded on.
    pub fn init(&mut self, min: f64, max: f64, dimensions: usize, splits: usize) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.projections = (0..splits)
            .map(|_| (0..dimensions).map(|_| rng.gen_range(min..=max)).collect())
            .collect();
        tracing::debug!(splits, dimensions, bits = self.bits, "lsh projections initialized");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn with_projections(seed: u64, bits: u32, projections: Vec<Vec<f64>>) -> LshIndex<K> {
        LshIndex { seed, bits, projections, table: HashMap::new() }
    }

    /// Returns the number of projection vectors currently held.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Encodes `v` into a signature: bit `i` is 1 iff `dot(v, projections[i])
    /// >= 0`. Bit 0 is the most significant bit of the returned integer.
    ///
    /// Uses `min(v.len(), projections.len())` projections, one bit per
    /// component of `v`; fails with [`Error::DimensionMismatch`] if `v` is
    /// longer than the projection set.
    pub fn encode(&self, v: &[f64]) -> Result<i64> {
        if v.len() > self.projections.len() {
            return Err(Error::DimensionMismatch { expected: self.projections.len(), received: v.len() });
        }

        let bits = v.len();
        let mut signature = 0i64;
        for (i, projection) in self.projections.iter().take(bits).enumerate() {
            let bit = if raw_dot(v, projection) >= 0.0 { 1i64 } else { 0i64 };
            signature |= bit << (bits - 1 - i);
        }
        Ok(signature)
    }

    /// Inserts a single `(key, vector)` pair, encoding the vector and
    /// appending `key` to that signature's bucket.
    pub fn insert_one(&mut self, key: K, v: &[f64]) -> Result<()> {
        let signature = self.encode(v)?;
        self.table.entry(signature).or_default().push(key);
        Ok(())
    }

    /// Inserts every `(key, vector)` pair in `data`, in order.
    ///
    /// Takes a slice of pairs rather than a map: insertion order then
    /// determines the order keys accumulate within a bucket, which a true
    /// hash map could not guarantee.
    pub fn insert(&mut self, data: &[(K, Vec<f64>)]) -> Result<()> {
        for (key, vector) in data {
            self.insert_one(key.clone(), vector)?;
        }
        Ok(())
    }

    /// Returns every key found in the query's own bucket and in every
    /// bucket within `radius` bit-flips of it, in ascending-radius,
    /// ascending-combination order. Duplicate keys across buckets are
    /// preserved, not deduplicated.
    ///
    /// Fails with [`Error::MissingBucket`] if the query's own bucket does
    /// not exist, even if neighboring buckets within `radius` would.
    pub fn query(&self, v: &[f64], radius: usize) -> Result<Vec<K>> {
        let signature = self.encode(v)?;
        if !self.table.contains_key(&signature) {
            return Err(Error::MissingBucket(signature));
        }

        let mut results = Vec::new();
        for bucket in self.buckets_in_radius(signature, radius) {
            if let Some(keys) = self.table.get(&bucket) {
                results.extend(keys.iter().cloned());
            }
        }
        tracing::trace!(signature, radius, found = results.len(), "lsh query finished");
        Ok(results)
    }

    fn buckets_in_radius(&self, query_signature: i64, radius: usize) -> Vec<i64> {
        let mut result = Vec::new();
        for r in 0..=radius {
            for combo in combinations(self.bits as usize, r) {
                let candidate = flip(query_signature, &combo);
                if self.table.contains_key(&candidate) {
                    result.push(candidate);
                }
            }
        }
        result
    }

    /// Ranks `candidates` against `query` by cosine similarity, descending.
    /// Ties are adjacent but their relative order is unspecified.
    pub fn sort_by_descending_similarity(
        &self,
        query: &[f64],
        candidates: &[Vec<f64>],
    ) -> Result<Vec<(Vec<f64>, f64)>> {
        let mut ranked = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let similarity = cosine(query, candidate)?;
            ranked.push((candidate.clone(), similarity));
        }
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Ok(ranked)
    }
}

/// Flips the bits at `positions` in `signature`.
pub(crate) fn flip(signature: i64, positions: &[usize]) -> i64 {
    positions.iter().fold(signature, |acc, &bit| acc ^ (1i64 << bit))
}

/// All `r`-element subsets of `{0, .., n-1}` in ascending lexicographic
/// order. `r == 0` yields a single empty subset.
pub(crate) fn combinations(n: usize, r: usize) -> Vec<Vec<usize>> {
    let mut result = Vec::new();
    let mut current = Vec::with_capacity(r);
    combinations_recurse(0, n, r, &mut current, &mut result);
    result
}

fn combinations_recurse(
    start: usize,
    n: usize,
    r: usize,
    current: &mut Vec<usize>,
    result: &mut Vec<Vec<usize>>,
) {
    if current.len() == r {
        result.push(current.clone());
        return;
    }
    for i in start..n {
        current.push(i);
        combinations_recurse(i + 1, n, r, current, result);
        current.pop();
    }
}

/// Dot product that stops at the shorter of the two operands instead of
/// rejecting a length mismatch, so a projection set wider than the query
/// vector (see [`LshIndex::encode`]) degrades gracefully rather than
/// panicking.
fn raw_dot(u: &[f64], v: &[f64]) -> f64 {
    u.iter().zip(v).map(|(a, b)| a * b).sum()
}
