//! Partition sets
//!
//! A partition set exposes the partitions of a partitioned job together with
//! the run config and tags used to launch a run for each partition.

use crate::job::JobDefinition;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use strata_core::{
    PartitionsDefinition, Value, PARTITION_NAME_TAG, PARTITION_SET_TAG, REPOSITORY_TAG,
};

/// Mode every partition set is registered under
pub const DEFAULT_MODE: &str = "default";

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSetDefinition {
    name: String,
    job_name: String,
    mode: String,
    partitions_def: PartitionsDefinition,
    run_config: Value,
    tags: BTreeMap<String, String>,

    /// Set when the owning repository is built
    repository: Option<String>,
}

impl PartitionSetDefinition {
    pub fn new(
        name: impl Into<String>,
        job_name: impl Into<String>,
        partitions_def: PartitionsDefinition,
    ) -> Self {
        Self {
            name: name.into(),
            job_name: job_name.into(),
            mode: DEFAULT_MODE.to_string(),
            partitions_def,
            run_config: json!({}),
            tags: BTreeMap::new(),
            repository: None,
        }
    }

    /// Partition set named `<job>_partition_set` for a partitioned job
    pub fn for_job(job: &JobDefinition) -> Option<Self> {
        let partitions_def = job.partitions_def()?;
        Some(Self::new(
            format!("{}_partition_set", job.name()),
            job.name(),
            partitions_def.clone(),
        ))
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Base run config every partition's config extends
    pub fn with_run_config(mut self, run_config: Value) -> Self {
        self.run_config = run_config;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub(crate) fn in_repository(mut self, repository_name: &str) -> Self {
        self.repository = Some(repository_name.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Repository the set was registered with
    pub fn repository_name(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn partitions_def(&self) -> &PartitionsDefinition {
        &self.partitions_def
    }

    /// Partition names as of `now`, in partition order
    pub fn partition_names(&self, now: DateTime<Utc>) -> Vec<String> {
        self.partitions_def.partition_keys(now)
    }

    pub fn has_partition(&self, name: &str, now: DateTime<Utc>) -> bool {
        self.partitions_def.has_partition_key(name, now)
    }

    /// Run config for one partition: the base config plus `partition_key`
    pub fn run_config_for_partition(&self, partition_name: &str) -> Value {
        let mut config = match &self.run_config {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        config.insert(
            "partition_key".to_string(),
            Value::String(partition_name.to_string()),
        );
        Value::Object(config)
    }

    /// Tags for a run of one partition
    pub fn tags_for_partition(&self, partition_name: &str) -> BTreeMap<String, String> {
        let mut tags = self.tags.clone();
        tags.insert(PARTITION_SET_TAG.to_string(), self.name.clone());
        tags.insert(PARTITION_NAME_TAG.to_string(), partition_name.to_string());
        if let Some(repository) = &self.repository {
            tags.insert(REPOSITORY_TAG.to_string(), repository.clone());
        }
        tags
    }
}
