//! Asset manifests
//!
//! A manifest is a JSON description of an asset group:
//!
//! ```json
//! {
//!   "assets": [
//!     {"key": "raw>orders", "value": [1, 2, 3]},
//!     {"key": "orders", "deps": ["raw>orders"], "partitions": {"type": "daily", "start": "2024-01-01"}}
//!   ],
//!   "source_assets": [{"key": "raw>customers", "io_manager_key": "warehouse"}],
//!   "io_managers": {"warehouse": {"type": "fs", "base_dir": "/data/warehouse"}},
//!   "executor": "in_process"
//! }
//! ```
//!
//! Keys use the `>` separated selection syntax. Every asset's compute function
//! returns its `value` (null when absent).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use strata_core::{
    AssetIn, AssetKey, AssetOut, AssetsDefinition, ExecutorDefinition, Output,
    PartitionsDefinition, ResourceDefinition, SourceAsset, StrataConfig, Value,
    DEFAULT_IO_MANAGER_KEY, DEFAULT_OUTPUT_NAME,
};
use strata_runtime::AssetGroup;

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub assets: Vec<AssetSpec>,

    #[serde(default)]
    pub source_assets: Vec<SourceAssetSpec>,

    #[serde(default)]
    pub io_managers: BTreeMap<String, IoManagerSpec>,

    /// Overrides `STRATA_EXECUTOR`
    pub executor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetSpec {
    pub key: String,

    #[serde(default)]
    pub deps: Vec<String>,

    pub io_manager_key: Option<String>,

    pub partitions: Option<PartitionsSpec>,

    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceAssetSpec {
    pub key: String,
    pub io_manager_key: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionsSpec {
    Static { keys: Vec<String> },
    Hourly { start: String },
    Daily { start: String },
    Weekly { start: String },
    Monthly { start: String },
}

impl PartitionsSpec {
    fn to_definition(&self) -> Result<PartitionsDefinition> {
        let definition = match self {
            Self::Static { keys } => PartitionsDefinition::static_keys(keys.clone()),
            Self::Hourly { start } => PartitionsDefinition::hourly(start)?,
            Self::Daily { start } => PartitionsDefinition::daily(start)?,
            Self::Weekly { start } => PartitionsDefinition::weekly(start)?,
            Self::Monthly { start } => PartitionsDefinition::monthly(start)?,
        };
        Ok(definition)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IoManagerSpec {
    Mem,
    Fs { base_dir: PathBuf },
}

impl IoManagerSpec {
    fn to_resource(&self) -> ResourceDefinition {
        match self {
            Self::Mem => ResourceDefinition::mem_io_manager(),
            Self::Fs { base_dir } => ResourceDefinition::fs_io_manager(base_dir.clone()),
        }
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Build the asset group described by the manifest
    ///
    /// `io_manager` is bound to a filesystem IO manager under the configured
    /// storage directory unless the manifest declares it.
    pub fn to_asset_group(&self, config: &StrataConfig) -> Result<AssetGroup> {
        let assets = self
            .assets
            .iter()
            .map(AssetSpec::to_definition)
            .collect::<Result<Vec<_>>>()?;

        let source_assets = self
            .source_assets
            .iter()
            .map(|spec| {
                let mut source = SourceAsset::new(AssetKey::from_user_string(&spec.key));
                if let Some(key) = &spec.io_manager_key {
                    source = source.with_io_manager_key(key.clone());
                }
                if let Some(description) = &spec.description {
                    source = source.with_description(description.clone());
                }
                source
            })
            .collect();

        let mut resource_defs: BTreeMap<String, ResourceDefinition> = self
            .io_managers
            .iter()
            .map(|(key, spec)| (key.clone(), spec.to_resource()))
            .collect();
        resource_defs
            .entry(DEFAULT_IO_MANAGER_KEY.to_string())
            .or_insert_with(|| ResourceDefinition::fs_io_manager(config.storage_dir.clone()));

        let executor = match &self.executor {
            Some(name) => Some(
                ExecutorDefinition::from_name(name)
                    .with_context(|| format!("Unknown executor '{}'", name))?,
            ),
            None => config.default_executor,
        };

        Ok(AssetGroup::new(assets, source_assets, resource_defs, executor)?)
    }
}

impl AssetSpec {
    /// Node names are derived from the full key so namespaced assets sharing a
    /// leaf name can live in the same group
    fn to_definition(&self) -> Result<AssetsDefinition> {
        let key = AssetKey::from_user_string(&self.key);

        let mut out = AssetOut::new(DEFAULT_OUTPUT_NAME).asset_key(key.clone());
        if let Some(io_manager_key) = &self.io_manager_key {
            out = out.io_manager_key(io_manager_key.clone());
        }

        let mut builder = AssetsDefinition::multi_asset(node_name(&key)).out(out);
        for dep in &self.deps {
            let dep_key = AssetKey::from_user_string(dep);
            builder = builder.input_with(AssetIn::new(node_name(&dep_key)).key(dep_key));
        }
        if let Some(partitions) = &self.partitions {
            builder = builder.partitions_def(partitions.to_definition()?);
        }

        let value = self.value.clone();
        let definition = builder
            .compute(move |_| Ok(vec![Output::new(DEFAULT_OUTPUT_NAME, value.clone())]))
            .build()?;
        Ok(definition)
    }
}

/// Node and input name for a key, unique per key
pub fn node_name(key: &AssetKey) -> String {
    key.path().join("__")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "assets": [
            {"key": "raw>orders", "value": 3},
            {"key": "orders", "deps": ["raw>orders", "raw>customers"], "io_manager_key": "warehouse"},
            {"key": "daily", "deps": ["orders"], "partitions": {"type": "static", "keys": ["a", "b"]}}
        ],
        "source_assets": [{"key": "raw>customers"}],
        "io_managers": {"warehouse": {"type": "mem"}}
    }"#;

    #[test]
    fn test_manifest_builds_group() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        let group = manifest.to_asset_group(&StrataConfig::default()).unwrap();

        assert_eq!(group.assets().len(), 3);
        assert_eq!(group.source_assets().len(), 1);
        assert!(group.resource_defs().contains_key("warehouse"));
        assert!(group.resource_defs().contains_key(DEFAULT_IO_MANAGER_KEY));

        let orders = &group.assets()[1];
        assert_eq!(
            orders.dependency_keys().into_iter().collect::<Vec<_>>(),
            vec![
                AssetKey::new(["raw", "customers"]),
                AssetKey::new(["raw", "orders"])
            ]
        );
        assert_eq!(orders.outputs()[0].io_manager_key, "warehouse");
        assert_eq!(orders.node_name(), "orders");
        assert_eq!(group.assets()[0].node_name(), "raw__orders");
        assert!(group.assets()[2].partitions_def().is_some());
        assert!(group.build_job("all", None).is_ok());
    }

    #[test]
    fn test_missing_io_manager_is_reported() {
        let manifest =
            Manifest::parse(r#"{"assets": [{"key": "a", "io_manager_key": "nope"}]}"#).unwrap();
        let err = manifest
            .to_asset_group(&StrataConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("requires io manager 'nope'"));
    }

    #[test]
    fn test_unknown_executor() {
        let manifest = Manifest::parse(r#"{"executor": "celery"}"#).unwrap();
        assert!(manifest.to_asset_group(&StrataConfig::default()).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, MANIFEST).unwrap();
        assert_eq!(Manifest::load(&path).unwrap().assets.len(), 3);
        assert!(Manifest::load(&dir.path().join("missing.json")).is_err());
    }
}
