//! CLI configuration management

use anyhow::Result;
use std::path::PathBuf;
use strata_core::StrataConfig;

/// Load configuration from the environment, applying command line overrides
pub fn load(storage_dir: Option<PathBuf>) -> Result<StrataConfig> {
    let config = StrataConfig::from_env()?;
    Ok(match storage_dir {
        Some(dir) => config.with_storage_dir(dir),
        None => config,
    })
}
