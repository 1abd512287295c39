/// The error type returned by every fallible operation in this crate.
///
/// Variants are grouped, in the derive order below, into caller-contract
/// violations, structural corruption, and expected-empty results; see the
/// crate-level documentation for the distinction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("dimension mismatch: expected {expected}, got {received}")]
    DimensionMismatch { expected: usize, received: usize },

    #[error("empty vector provided where a non-empty vector was required")]
    EmptyVector,

    #[error("vector has zero norm and cannot be used in a cosine computation")]
    ZeroNorm,

    #[error("cannot fit {k} clusters out of {n} points: the data set must at least equal k")]
    InsufficientData { k: usize, n: usize },

    #[error("no item indexed under id {0}")]
    UnknownId(u32),

    #[error("traversal reached node handle {0:?} which does not exist in the node table")]
    InvalidNodeHandle(crate::forest::NodeId),

    #[error("no bucket exists for signature {0}")]
    MissingBucket(i64),

    #[error("rows have inconsistent lengths: expected {expected}, got {received} at row {row}")]
    RaggedRows { expected: usize, received: usize, row: usize },
}

/// A `Result` alias defaulting to this crate's [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
