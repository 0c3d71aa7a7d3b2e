//! Resource definitions
//!
//! Resources are shared, read-only collaborators referenced by string key.
//! Two resource definitions are equal only when they are the same object:
//! conflict detection between groups and assets relies on identity, never on
//! the resource's contents.

use crate::config::StrataConfig;
use crate::io_manager::{FsIoManager, InMemoryIoManager, IoManager};
use crate::Value;
use std::sync::LazyLock;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Resource key every group binds an IO manager to
pub const DEFAULT_IO_MANAGER_KEY: &str = "io_manager";

static DEFAULT_IO_MANAGER: LazyLock<ResourceDefinition> = LazyLock::new(|| {
    let storage_dir = StrataConfig::from_env()
        .map(|config| config.storage_dir)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring invalid configuration for default IO manager");
            StrataConfig::default().storage_dir
        });
    ResourceDefinition::fs_io_manager(storage_dir)
});

/// A resource bound to a key on a group, job or asset
#[derive(Clone)]
pub struct ResourceDefinition {
    inner: Arc<ResourceInner>,
}

struct ResourceInner {
    name: String,
    kind: ResourceKind,
}

enum ResourceKind {
    Value(Value),
    IoManager(Arc<dyn IoManager>),
}

impl ResourceDefinition {
    /// A resource that always provides `value`
    pub fn hardcoded_resource(value: Value) -> Self {
        Self::new("hardcoded_resource", ResourceKind::Value(value))
    }

    /// A resource that provides nothing
    pub fn none_resource() -> Self {
        Self::new("none_resource", ResourceKind::Value(Value::Null))
    }

    /// Wrap an IO manager implementation
    pub fn io_manager(name: impl Into<String>, manager: impl IoManager + 'static) -> Self {
        Self::from_io_manager(name, Arc::new(manager))
    }

    /// Wrap a shared IO manager, e.g. one a test keeps a handle to
    pub fn from_io_manager(name: impl Into<String>, manager: Arc<dyn IoManager>) -> Self {
        Self::new(name, ResourceKind::IoManager(manager))
    }

    /// A fresh in-memory IO manager
    pub fn mem_io_manager() -> Self {
        Self::io_manager("mem_io_manager", InMemoryIoManager::new())
    }

    /// A filesystem IO manager rooted at `base_dir`
    pub fn fs_io_manager(base_dir: impl Into<PathBuf>) -> Self {
        Self::io_manager("fs_io_manager", FsIoManager::new(base_dir))
    }

    /// The process-wide IO manager bound to `io_manager` when a group does not
    /// provide one. Rooted at `STRATA_STORAGE_DIR`.
    pub fn default_io_manager() -> Self {
        DEFAULT_IO_MANAGER.clone()
    }

    fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                name: name.into(),
                kind,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Value provided to compute functions, for non IO manager resources
    pub fn value(&self) -> Option<&Value> {
        match &self.inner.kind {
            ResourceKind::Value(value) => Some(value),
            ResourceKind::IoManager(_) => None,
        }
    }

    pub fn as_io_manager(&self) -> Option<Arc<dyn IoManager>> {
        match &self.inner.kind {
            ResourceKind::IoManager(manager) => Some(manager.clone()),
            ResourceKind::Value(_) => None,
        }
    }

    pub fn is_io_manager(&self) -> bool {
        matches!(self.inner.kind, ResourceKind::IoManager(_))
    }

    /// Identity comparison
    pub fn same_as(&self, other: &ResourceDefinition) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for ResourceDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for ResourceDefinition {}

impl fmt::Debug for ResourceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDefinition")
            .field("name", &self.inner.name)
            .field("io_manager", &self.is_io_manager())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_equality() {
        let a = ResourceDefinition::hardcoded_resource(json!("blah"));
        let b = ResourceDefinition::hardcoded_resource(json!("blah"));

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_default_io_manager_is_shared() {
        let a = ResourceDefinition::default_io_manager();
        let b = ResourceDefinition::default_io_manager();
        assert!(a.same_as(&b));
        assert!(a.is_io_manager());
        assert_eq!(a.name(), "fs_io_manager");
    }

    #[test]
    fn test_value_resources() {
        let resource = ResourceDefinition::hardcoded_resource(json!({"conn": "db"}));
        assert_eq!(resource.value(), Some(&json!({"conn": "db"})));
        assert!(resource.as_io_manager().is_none());

        assert_eq!(ResourceDefinition::none_resource().value(), Some(&Value::Null));
    }
}
