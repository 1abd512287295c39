//! The random-projection forest: node arena, parallel tree builder, and the
//! public [`ForestIndex`].

mod builder;
mod index;
mod node;

pub use index::{sort_candidates, ForestIndex};
pub use node::{ForestNode, NodeId};
