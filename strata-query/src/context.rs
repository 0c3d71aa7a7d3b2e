//! Workspace context
//!
//! Resolvers never touch definitions directly. They go through a
//! [`WorkspaceContext`], which hands out repository locations and the shared
//! run storage, so the same resolvers serve in-process repositories and
//! locations backed by something else.

use crate::{QueryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_core::Value;
use strata_runtime::partition_set::PartitionSetDefinition;
use strata_runtime::{Repository, RunStorage};

/// Identifies a repository by location and repository name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySelector {
    pub repository_location_name: String,
    pub repository_name: String,
}

impl RepositorySelector {
    pub fn new(location_name: impl Into<String>, repository_name: impl Into<String>) -> Self {
        Self {
            repository_location_name: location_name.into(),
            repository_name: repository_name.into(),
        }
    }
}

/// A repository that was found in a location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryHandle {
    pub location_name: String,
    pub repository_name: String,
}

impl RepositoryHandle {
    pub fn selector(&self) -> RepositorySelector {
        RepositorySelector::new(self.location_name.clone(), self.repository_name.clone())
    }
}

/// A partition set as seen from outside its repository
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalPartitionSet {
    pub name: String,
    pub pipeline_name: String,
    pub mode: String,
    pub repository_handle: RepositoryHandle,
}

impl ExternalPartitionSet {
    pub fn from_definition(definition: &PartitionSetDefinition, handle: RepositoryHandle) -> Self {
        Self {
            name: definition.name().to_string(),
            pipeline_name: definition.job_name().to_string(),
            mode: definition.mode().to_string(),
            repository_handle: handle,
        }
    }
}

/// Serves partition data of the repositories it hosts
pub trait RepositoryLocation: Send + Sync {
    fn name(&self) -> &str;

    /// Handle of a hosted repository
    fn get_repository(&self, repository_name: &str) -> Result<RepositoryHandle>;

    fn get_external_partition_sets(
        &self,
        handle: &RepositoryHandle,
    ) -> Result<Vec<ExternalPartitionSet>>;

    fn get_external_partition_names(
        &self,
        handle: &RepositoryHandle,
        partition_set_name: &str,
    ) -> Result<Vec<String>>;

    fn get_external_partition_config(
        &self,
        handle: &RepositoryHandle,
        partition_set_name: &str,
        partition_name: &str,
    ) -> Result<Value>;

    fn get_external_partition_tags(
        &self,
        handle: &RepositoryHandle,
        partition_set_name: &str,
        partition_name: &str,
    ) -> Result<BTreeMap<String, String>>;
}

/// What resolvers need from the host
pub trait WorkspaceContext {
    fn get_repository_location(&self, name: &str) -> Result<Arc<dyn RepositoryLocation>>;

    fn run_storage(&self) -> &dyn RunStorage;
}

/// Location serving repositories built in the current process
pub struct InProcessRepositoryLocation {
    name: String,
    repositories: BTreeMap<String, Repository>,
    clock: fn() -> DateTime<Utc>,
}

impl InProcessRepositoryLocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repositories: BTreeMap::new(),
            clock: Utc::now,
        }
    }

    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repositories
            .insert(repository.name().to_string(), repository);
        self
    }

    /// Clock used to list time-window partitions
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    fn repository(&self, handle: &RepositoryHandle) -> Result<&Repository> {
        self.repositories
            .get(&handle.repository_name)
            .ok_or_else(|| QueryError::RepositoryNotFound {
                location_name: self.name.clone(),
                repository_name: handle.repository_name.clone(),
            })
    }

    fn partition_set(
        &self,
        handle: &RepositoryHandle,
        partition_set_name: &str,
    ) -> Result<&PartitionSetDefinition> {
        self.repository(handle)?
            .get_partition_set(partition_set_name)
            .ok_or_else(|| QueryError::PartitionSetNotFound(partition_set_name.to_string()))
    }
}

impl RepositoryLocation for InProcessRepositoryLocation {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_repository(&self, repository_name: &str) -> Result<RepositoryHandle> {
        if !self.repositories.contains_key(repository_name) {
            return Err(QueryError::RepositoryNotFound {
                location_name: self.name.clone(),
                repository_name: repository_name.to_string(),
            });
        }
        Ok(RepositoryHandle {
            location_name: self.name.clone(),
            repository_name: repository_name.to_string(),
        })
    }

    fn get_external_partition_sets(
        &self,
        handle: &RepositoryHandle,
    ) -> Result<Vec<ExternalPartitionSet>> {
        Ok(self
            .repository(handle)?
            .partition_sets()
            .iter()
            .map(|set| ExternalPartitionSet::from_definition(set, handle.clone()))
            .collect())
    }

    fn get_external_partition_names(
        &self,
        handle: &RepositoryHandle,
        partition_set_name: &str,
    ) -> Result<Vec<String>> {
        Ok(self
            .partition_set(handle, partition_set_name)?
            .partition_names((self.clock)()))
    }

    fn get_external_partition_config(
        &self,
        handle: &RepositoryHandle,
        partition_set_name: &str,
        partition_name: &str,
    ) -> Result<Value> {
        Ok(self
            .partition_set(handle, partition_set_name)?
            .run_config_for_partition(partition_name))
    }

    fn get_external_partition_tags(
        &self,
        handle: &RepositoryHandle,
        partition_set_name: &str,
        partition_name: &str,
    ) -> Result<BTreeMap<String, String>> {
        Ok(self
            .partition_set(handle, partition_set_name)?
            .tags_for_partition(partition_name))
    }
}

/// Repository locations plus the run storage they share
pub struct Workspace {
    locations: BTreeMap<String, Arc<dyn RepositoryLocation>>,
    run_storage: Arc<dyn RunStorage>,
}

impl Workspace {
    pub fn new(run_storage: Arc<dyn RunStorage>) -> Self {
        Self {
            locations: BTreeMap::new(),
            run_storage,
        }
    }

    pub fn with_location(mut self, location: Arc<dyn RepositoryLocation>) -> Self {
        self.locations.insert(location.name().to_string(), location);
        self
    }

    pub fn location_names(&self) -> Vec<&str> {
        self.locations.keys().map(String::as_str).collect()
    }
}

impl WorkspaceContext for Workspace {
    fn get_repository_location(&self, name: &str) -> Result<Arc<dyn RepositoryLocation>> {
        self.locations
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::RepositoryLocationNotFound(name.to_string()))
    }

    fn run_storage(&self) -> &dyn RunStorage {
        self.run_storage.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_runtime::InMemoryRunStorage;

    #[test]
    fn test_unknown_location_and_repository() {
        let location = InProcessRepositoryLocation::new("loc")
            .with_repository(Repository::builder("repo").build().unwrap());
        let workspace =
            Workspace::new(Arc::new(InMemoryRunStorage::new())).with_location(Arc::new(location));

        assert!(matches!(
            workspace.get_repository_location("missing"),
            Err(QueryError::RepositoryLocationNotFound(_))
        ));

        let location = workspace.get_repository_location("loc").unwrap();
        let handle = location.get_repository("repo").unwrap();
        assert_eq!(handle.selector(), RepositorySelector::new("loc", "repo"));
        assert!(matches!(
            location.get_repository("other"),
            Err(QueryError::RepositoryNotFound { .. })
        ));
        assert!(matches!(
            location.get_external_partition_names(&handle, "nope"),
            Err(QueryError::PartitionSetNotFound(_))
        ));
    }
}
