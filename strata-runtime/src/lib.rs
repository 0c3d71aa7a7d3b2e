//! # Strata Runtime
//!
//! Asset groups, job assembly, in-process execution, run storage and
//! repositories.

pub mod events;
pub mod execution;
pub mod group;
pub mod job;
pub mod partition_set;
pub mod repository;
pub mod run_storage;
pub mod state_machine;

// Re-export commonly used types
pub use events::{RunEvent, RunEventKind};
pub use execution::{ExecuteOptions, ExecutionResult};
pub use group::{AssetGroup, AssetGroupBuilder, BASE_JOB_NAME};
pub use job::{InputSource, InputWiring, JobDefinition, JobNode};
pub use partition_set::PartitionSetDefinition;
pub use repository::{Repository, RepositoryBuilder};
pub use run_storage::{InMemoryRunStorage, RunPartitionData, RunRecord, RunStorage, RunsFilter};
pub use state_machine::{RunStatus, StateMachine};
pub use strata_lineage::Selection;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for runtime operations
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum Error {
    /// Definition, selection or executor error raised while building or launching
    #[error(transparent)]
    Core(#[from] strata_core::Error),

    #[error("Run storage error: {0}")]
    RunStorage(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub fn is_invalid_definition(&self) -> bool {
        matches!(self, Error::Core(e) if e.is_invalid_definition())
    }

    pub fn is_invalid_subset(&self) -> bool {
        matches!(self, Error::Core(e) if e.is_invalid_subset())
    }

    pub fn is_unmet_executor_requirements(&self) -> bool {
        matches!(
            self,
            Error::Core(strata_core::Error::UnmetExecutorRequirements(_))
        )
    }
}
