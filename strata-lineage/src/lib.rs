//! # Strata Lineage
//!
//! Asset dependency graph, depth-limited lineage queries and resolution of
//! asset selection expressions.

pub mod graph;
pub mod queries;
pub mod selection;

// Re-export commonly used types
pub use graph::{AssetGraph, AssetNode, NodeKind};
pub use queries::{LineageInfo, LineageQuery};
pub use selection::{Selection, SelectionResolver};

/// Result type for lineage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for lineage operations
///
/// Selection failures are reported as [`strata_core::Error::InvalidSubset`]
/// because callers surface them as definition-time errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Node not found: {0}")]
    NodeNotFound(String),
}
