//! # Strata Core
//!
//! Definition layer for Strata: asset keys, asset definitions (single, multi
//! and graph-backed), source assets, resources, IO managers, executors and
//! partitions definitions.

pub mod asset;
pub mod config;
pub mod executor;
pub mod io_manager;
pub mod key;
pub mod op;
pub mod partition;
pub mod resource;
pub mod tags;

// Re-export commonly used types
pub use asset::{
    AssetBuilder, AssetIn, AssetInput, AssetOut, AssetsDefinition, ComputeContext, ComputeFn,
    MultiAssetBuilder, Output, SourceAsset, DEFAULT_OUTPUT_NAME,
};
pub use config::StrataConfig;
pub use executor::ExecutorDefinition;
pub use io_manager::{FsIoManager, InMemoryIoManager, InputContext, IoManager, OutputContext};
pub use key::AssetKey;
pub use op::{GraphAssetBuilder, OpDefinition, OpFn};
pub use partition::{PartitionsDefinition, TimeGranularity};
pub use resource::{ResourceDefinition, DEFAULT_IO_MANAGER_KEY};
pub use tags::{get_tag_type, TagType, PARTITION_NAME_TAG, PARTITION_SET_TAG, REPOSITORY_TAG};

/// Values passed between assets through IO managers
pub type Value = serde_json::Value;

/// Result type for Strata core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Strata core operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Static definition problem detected while building a group, job or repository
    #[error("{0}")]
    InvalidDefinition(String),

    /// A selection clause matched no assets
    #[error("{0}")]
    InvalidSubset(String),

    /// The requested entry point cannot run with the configured executor
    #[error("{0}")]
    UnmetExecutorRequirements(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO manager error: {0}")]
    IoManager(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn is_invalid_definition(&self) -> bool {
        matches!(self, Error::InvalidDefinition(_))
    }

    pub fn is_invalid_subset(&self) -> bool {
        matches!(self, Error::InvalidSubset(_))
    }
}
