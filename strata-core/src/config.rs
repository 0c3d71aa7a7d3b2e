//! Environment configuration
//!
//! Environment variables:
//! - `STRATA_STORAGE_DIR`: base directory of the default filesystem IO manager
//!   (default: `<tmp>/strata/storage`)
//! - `STRATA_EXECUTOR`: executor applied to groups built from manifests
//!   (`in_process` or `multiprocess`, default: unset)

use crate::executor::ExecutorDefinition;
use crate::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Process-level settings
#[derive(Debug, Clone, PartialEq)]
pub struct StrataConfig {
    /// Base directory for values persisted by the filesystem IO manager
    pub storage_dir: PathBuf,

    /// Executor applied to asset groups built from manifests
    pub default_executor: Option<ExecutorDefinition>,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            default_executor: None,
        }
    }
}

impl StrataConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_dir = lookup("STRATA_STORAGE_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_storage_dir);

        let default_executor = match lookup("STRATA_EXECUTOR") {
            Some(name) if !name.trim().is_empty() => Some(
                ExecutorDefinition::from_name(name.trim()).ok_or_else(|| {
                    Error::Config(format!(
                        "STRATA_EXECUTOR must be 'in_process' or 'multiprocess', got '{}'",
                        name
                    ))
                })?,
            ),
            _ => None,
        };

        Ok(Self {
            storage_dir,
            default_executor,
        })
    }

    /// Override the storage directory (e.g. from a CLI flag)
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }
}

fn default_storage_dir() -> PathBuf {
    env::temp_dir().join("strata").join("storage")
}
