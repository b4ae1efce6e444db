//! Hierarchical clustering index for approximate nearest-neighbor search.
//!
//! The dataset is recursively partitioned by k-centers clustering into a
//! forest of independent trees; queries traverse all of them best-bin-first
//! under a configurable check budget. See
//! [`HierarchicalClusteringIndex`] for the entry points.

pub mod arena;
pub mod centers;
pub mod dataset;
pub mod distance;
pub mod index;
mod math;
pub mod result;

pub use centers::CentersInit;
pub use dataset::Dataset;
pub use distance::{Distance, Manhattan, SquaredEuclidean};
pub use index::{HierarchicalClusteringIndex, IndexParams, SearchParams};
pub use result::{KnnResultSet, Neighbor, ResultSet};
pub use roaring::RoaringBitmap;


/// Dense handle of a vector row in a [`Dataset`].
pub type PointId = u32;

/// Errors that can occur when building, mutating, querying or persisting the
/// index.
#[derive(thiserror::Error, Debug)]
pub enum HclusterError {
    /// Returned when an invalid parameter value is supplied.
    #[error("bad parameter: {0}")]
    BadParameter(&'static str),
    /// Returned when an input vector's column count does not match the index.
    #[error("shape mismatch: expected {expected} columns, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    /// Returned when persisted index data is malformed or corrupted.
    #[error("invalid persistence data: {0}")]
    InvalidPersistence(&'static str),
    /// Propagated from the underlying byte sink or source.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
