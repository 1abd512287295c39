//! In-memory approximate nearest neighbor search over dense `f64` vectors.
//!
//! Two independent indexes are provided:
//!
//! - [`ForestIndex`]: an ensemble of random-projection binary trees, queried
//!   with a best-first priority traversal and re-ranked by exact cosine
//!   distance. Good for top-k retrieval.
//! - [`LshIndex`]: a signed-random-projection hash table, queried by
//!   Hamming-ball expansion around the query's own bucket. Good for
//!   threshold/radius retrieval and for ranking a small candidate set by
//!   cosine similarity.
//!
//! Both indexes are built once and answer queries without further mutation.
//! Construction takes an explicit source of randomness everywhere it
//! matters, so a caller who needs a reproducible index can supply a seeded
//! `Rng` instead of relying on the OS-seeded convenience constructors.

mod error;
mod forest;
mod lsh;
mod numerics;
mod priority_queue;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
pub use forest::{sort_candidates, ForestIndex, ForestNode, NodeId};
pub use lsh::LshIndex;
pub use numerics::{
    argmax, cosine, cosine_distance, dot, euclidean_distance, euclidean_similarity, kmeans,
    kmeans_seeded, mean,
};
