//! IO managers
//!
//! IO managers persist the value of every asset output and load it again for
//! downstream steps, both within a run and across runs. Jobs refer to them by
//! resource key only.

use crate::key::AssetKey;
use crate::{Error, Result, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Describes an output being handed to an IO manager
#[derive(Debug, Clone, PartialEq)]
pub struct OutputContext {
    pub run_id: Uuid,

    /// Node that produced the output
    pub step_key: String,

    /// Output name on the producing node
    pub name: String,

    pub asset_key: Option<AssetKey>,

    pub partition_key: Option<String>,
}

/// Describes an input being loaded by an IO manager
#[derive(Debug, Clone, PartialEq)]
pub struct InputContext {
    /// Input name on the consuming node
    pub name: String,

    pub asset_key: Option<AssetKey>,

    /// Set when the input is produced by a node in the same run
    pub upstream_output: Option<OutputContext>,

    pub partition_key: Option<String>,
}

/// Persists and loads asset values
pub trait IoManager: Send + Sync {
    /// Store the value produced for an output
    fn handle_output(&self, context: &OutputContext, value: &Value) -> Result<()>;

    /// Load the value consumed by an input
    fn load_input(&self, context: &InputContext) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum StorageKey {
    Asset(AssetKey, Option<String>),
    Step(Uuid, String, String),
}

impl StorageKey {
    fn for_output(context: &OutputContext) -> Self {
        match &context.asset_key {
            Some(key) => Self::Asset(key.clone(), context.partition_key.clone()),
            None => Self::Step(context.run_id, context.step_key.clone(), context.name.clone()),
        }
    }

    fn for_input(context: &InputContext) -> Option<Self> {
        match (&context.asset_key, &context.upstream_output) {
            (Some(key), _) => Some(Self::Asset(key.clone(), context.partition_key.clone())),
            (None, Some(upstream)) => Some(Self::for_output(upstream)),
            (None, None) => None,
        }
    }
}

/// Keeps values in memory, keyed by asset key so later runs can load them
#[derive(Default)]
pub struct InMemoryIoManager {
    values: RwLock<HashMap<StorageKey, Value>>,
}

impl InMemoryIoManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value last stored for an unpartitioned asset
    pub fn get(&self, key: &AssetKey) -> Option<Value> {
        self.values
            .read()
            .get(&StorageKey::Asset(key.clone(), None))
            .cloned()
    }

    /// Seed a value, as if a previous run had materialized it
    pub fn insert(&self, key: AssetKey, value: Value) {
        self.values.write().insert(StorageKey::Asset(key, None), value);
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl IoManager for InMemoryIoManager {
    fn handle_output(&self, context: &OutputContext, value: &Value) -> Result<()> {
        self.values
            .write()
            .insert(StorageKey::for_output(context), value.clone());
        Ok(())
    }

    fn load_input(&self, context: &InputContext) -> Result<Value> {
        let key = StorageKey::for_input(context).ok_or_else(|| {
            Error::IoManager(format!(
                "Input '{}' has neither an asset key nor an upstream output",
                context.name
            ))
        })?;
        self.values.read().get(&key).cloned().ok_or_else(|| {
            Error::IoManager(format!(
                "No value stored for input '{}' ({})",
                context.name,
                describe(context)
            ))
        })
    }
}

/// Stores values as JSON files below a base directory
///
/// Asset outputs live at `<base>/<key path>[/<partition>].json`, which lets a
/// later run load what an earlier run materialized.
#[derive(Debug, Clone)]
pub struct FsIoManager {
    base_dir: PathBuf,
}

impl FsIoManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &StorageKey) -> PathBuf {
        let mut path = self.base_dir.clone();
        match key {
            StorageKey::Asset(asset_key, partition) => {
                for segment in asset_key.path() {
                    path.push(segment);
                }
                if let Some(partition) = partition {
                    path.push(partition);
                }
            }
            StorageKey::Step(run_id, step, output) => {
                path.push(run_id.to_string());
                path.push(step);
                path.push(output);
            }
        }
        path.set_extension("json");
        path
    }
}

impl IoManager for FsIoManager {
    fn handle_output(&self, context: &OutputContext, value: &Value) -> Result<()> {
        let path = self.path_for(&StorageKey::for_output(context));
        let parent = path
            .parent()
            .ok_or_else(|| Error::IoManager(format!("Invalid storage path {}", path.display())))?;
        fs::create_dir_all(parent).map_err(|e| io_error(&path, e))?;

        // Write to a sibling temp file first so readers never see partial JSON.
        let mut file = tempfile::NamedTempFile::new_in(parent).map_err(|e| io_error(&path, e))?;
        let bytes = serde_json::to_vec(value).map_err(|e| Error::IoManager(e.to_string()))?;
        file.write_all(&bytes).map_err(|e| io_error(&path, e))?;
        file.persist(&path).map_err(|e| io_error(&path, e.error))?;

        tracing::debug!(path = %path.display(), output = %context.name, "Stored output");
        Ok(())
    }

    fn load_input(&self, context: &InputContext) -> Result<Value> {
        let key = StorageKey::for_input(context).ok_or_else(|| {
            Error::IoManager(format!(
                "Input '{}' has neither an asset key nor an upstream output",
                context.name
            ))
        })?;
        let path = self.path_for(&key);
        let bytes = fs::read(&path).map_err(|e| io_error(&path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            Error::IoManager(format!("Corrupt value at {}: {}", path.display(), e))
        })
    }
}

fn io_error(path: &Path, err: std::io::Error) -> Error {
    Error::IoManager(format!("{}: {}", path.display(), err))
}

fn describe(context: &InputContext) -> String {
    match (&context.asset_key, &context.upstream_output) {
        (Some(key), _) => key.to_string(),
        (None, Some(upstream)) => format!("{}.{}", upstream.step_key, upstream.name),
        (None, None) => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn output_ctx(key: &str) -> OutputContext {
        OutputContext {
            run_id: Uuid::new_v4(),
            step_key: key.to_string(),
            name: "result".to_string(),
            asset_key: Some(AssetKey::from(key)),
            partition_key: None,
        }
    }

    fn input_ctx(key: &str) -> InputContext {
        InputContext {
            name: key.to_string(),
            asset_key: Some(AssetKey::from(key)),
            upstream_output: None,
            partition_key: None,
        }
    }

    #[test]
    fn test_in_memory_loads_across_runs() {
        let manager = InMemoryIoManager::new();
        manager.handle_output(&output_ctx("a"), &json!(6)).unwrap();

        // A different run loads by asset key only
        assert_eq!(manager.load_input(&input_ctx("a")).unwrap(), json!(6));
        assert_eq!(manager.get(&AssetKey::from("a")), Some(json!(6)));
    }

    #[test]
    fn test_in_memory_missing_value() {
        let manager = InMemoryIoManager::new();
        let err = manager.load_input(&input_ctx("missing")).unwrap_err();
        assert!(matches!(err, Error::IoManager(_)));
        assert!(err.to_string().contains("AssetKey(['missing'])"));
    }

    #[test]
    fn test_in_memory_partitions_are_separate() {
        let manager = InMemoryIoManager::new();
        let mut ctx = output_ctx("daily");
        ctx.partition_key = Some("2024-01-01".to_string());
        manager.handle_output(&ctx, &json!(1)).unwrap();

        let mut input = input_ctx("daily");
        assert!(manager.load_input(&input).is_err());
        input.partition_key = Some("2024-01-01".to_string());
        assert_eq!(manager.load_input(&input).unwrap(), json!(1));
    }

    #[test]
    fn test_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = FsIoManager::new(dir.path());
        let mut ctx = output_ctx("orders");
        ctx.asset_key = Some(AssetKey::new(["core", "orders"]));
        manager.handle_output(&ctx, &json!({"rows": 3})).unwrap();

        assert!(dir.path().join("core").join("orders.json").exists());

        let mut input = input_ctx("orders");
        input.asset_key = Some(AssetKey::new(["core", "orders"]));
        assert_eq!(manager.load_input(&input).unwrap(), json!({"rows": 3}));
    }

    #[test]
    fn test_fs_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = FsIoManager::new(dir.path());
        assert!(matches!(
            manager.load_input(&input_ctx("nope")),
            Err(Error::IoManager(_))
        ));
    }
}
