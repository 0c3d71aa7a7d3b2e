//! # Strata Query
//!
//! Read-only resolvers over a workspace of repository locations: partition
//! sets, their partitions, per-partition run config and tags, and the runs
//! launched for each partition.

pub mod context;
pub mod pagination;
pub mod partition_sets;

// Re-export commonly used types
pub use context::{
    ExternalPartitionSet, InProcessRepositoryLocation, RepositoryHandle, RepositoryLocation,
    RepositorySelector, Workspace, WorkspaceContext,
};
pub use pagination::apply_cursor_limit_reverse;
pub use partition_sets::{
    Partition, PartitionRun, PartitionRunConfig, PartitionSet, PartitionSetOrError,
    PartitionSets, PartitionStatus, PartitionStatuses, PartitionTag, PartitionTags, Partitions,
};

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

/// Error types for query operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Repository location not found: {0}")]
    RepositoryLocationNotFound(String),

    #[error("Repository '{repository_name}' not found in location '{location_name}'")]
    RepositoryNotFound {
        location_name: String,
        repository_name: String,
    },

    #[error("Partition set not found: {0}")]
    PartitionSetNotFound(String),

    #[error("Cursor '{0}' not found")]
    CursorNotFound(String),

    #[error("Failed to serialize run config: {0}")]
    Serialization(String),

    #[error(transparent)]
    Runtime(#[from] strata_runtime::Error),
}
