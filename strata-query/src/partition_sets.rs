//! Partition set resolvers
//!
//! Each resolver returns a serializable listing shape. Lookups that can miss
//! return a [`QueryError`]; a missing partition set asked for by name is a
//! regular result ([`PartitionSetOrError::PartitionSetNotFound`]).

use crate::context::{
    ExternalPartitionSet, RepositoryHandle, RepositoryLocation, RepositorySelector,
    WorkspaceContext,
};
use crate::pagination::apply_cursor_limit_reverse;
use crate::{QueryError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::{
    get_tag_type, TagType, PARTITION_NAME_TAG, PARTITION_SET_TAG, REPOSITORY_TAG,
};
use strata_runtime::{RunRecord, RunStatus, RunsFilter};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSet {
    pub name: String,
    pub pipeline_name: String,
    pub mode: String,
    pub repository_location_name: String,
    pub repository_name: String,
}

impl From<&ExternalPartitionSet> for PartitionSet {
    fn from(set: &ExternalPartitionSet) -> Self {
        Self {
            name: set.name.clone(),
            pipeline_name: set.pipeline_name.clone(),
            mode: set.mode.clone(),
            repository_location_name: set.repository_handle.location_name.clone(),
            repository_name: set.repository_handle.repository_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionSets {
    pub results: Vec<PartitionSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "__typename")]
pub enum PartitionSetOrError {
    PartitionSet(PartitionSet),
    #[serde(rename_all = "camelCase")]
    PartitionSetNotFound {
        partition_set_name: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub name: String,
    pub partition_set_name: String,
    pub pipeline_name: String,
    pub mode: String,
}

impl Partition {
    fn new(partition_set: &ExternalPartitionSet, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_set_name: partition_set.name.clone(),
            pipeline_name: partition_set.pipeline_name.clone(),
            mode: partition_set.mode.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partitions {
    pub results: Vec<Partition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionRunConfig {
    /// Run config rendered as pretty-printed JSON
    pub run_config: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionTag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionTags {
    pub results: Vec<PartitionTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionStatus {
    pub id: String,
    pub partition_name: String,
    pub run_status: RunStatus,

    /// Seconds between run start and end, when both are known
    pub run_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionStatuses {
    pub results: Vec<PartitionStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionRun {
    pub id: String,
    pub partition_name: String,
    pub run: Option<RunRecord>,
}

fn repository_handle(
    context: &dyn WorkspaceContext,
    selector: &RepositorySelector,
) -> Result<(Arc<dyn RepositoryLocation>, RepositoryHandle)> {
    let location = context.get_repository_location(&selector.repository_location_name)?;
    let handle = location.get_repository(&selector.repository_name)?;
    Ok((location, handle))
}

/// Partition sets of `pipeline_name`, sorted by pipeline, mode and name
pub fn get_partition_sets(
    context: &dyn WorkspaceContext,
    selector: &RepositorySelector,
    pipeline_name: &str,
) -> Result<PartitionSets> {
    let (location, handle) = repository_handle(context, selector)?;
    let mut partition_sets: Vec<ExternalPartitionSet> = location
        .get_external_partition_sets(&handle)?
        .into_iter()
        .filter(|set| set.pipeline_name == pipeline_name)
        .collect();
    partition_sets.sort_by(|a, b| {
        (&a.pipeline_name, &a.mode, &a.name).cmp(&(&b.pipeline_name, &b.mode, &b.name))
    });

    Ok(PartitionSets {
        results: partition_sets.iter().map(PartitionSet::from).collect(),
    })
}

/// A single partition set by name
pub fn get_partition_set(
    context: &dyn WorkspaceContext,
    selector: &RepositorySelector,
    partition_set_name: &str,
) -> Result<PartitionSetOrError> {
    let (location, handle) = repository_handle(context, selector)?;
    let found = location
        .get_external_partition_sets(&handle)?
        .into_iter()
        .find(|set| set.name == partition_set_name);

    Ok(match found {
        Some(set) => PartitionSetOrError::PartitionSet(PartitionSet::from(&set)),
        None => PartitionSetOrError::PartitionSetNotFound {
            partition_set_name: partition_set_name.to_string(),
            message: QueryError::PartitionSetNotFound(partition_set_name.to_string()).to_string(),
        },
    })
}

/// A partition of `partition_set`; the name is not checked against the set
pub fn get_partition_by_name(
    partition_set: &ExternalPartitionSet,
    partition_name: &str,
) -> Partition {
    Partition::new(partition_set, partition_name)
}

pub fn get_partition_config(
    context: &dyn WorkspaceContext,
    handle: &RepositoryHandle,
    partition_set_name: &str,
    partition_name: &str,
) -> Result<PartitionRunConfig> {
    let location = context.get_repository_location(&handle.location_name)?;
    let run_config =
        location.get_external_partition_config(handle, partition_set_name, partition_name)?;

    Ok(PartitionRunConfig {
        run_config: pretty_json(&run_config)?,
    })
}

fn pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| QueryError::Serialization(e.to_string()))
}

/// Tags of a partition's runs, without hidden tags
pub fn get_partition_tags(
    context: &dyn WorkspaceContext,
    handle: &RepositoryHandle,
    partition_set_name: &str,
    partition_name: &str,
) -> Result<PartitionTags> {
    let location = context.get_repository_location(&handle.location_name)?;
    let tags = location.get_external_partition_tags(handle, partition_set_name, partition_name)?;

    Ok(PartitionTags {
        results: tags
            .into_iter()
            .filter(|(key, _)| get_tag_type(key) != TagType::Hidden)
            .map(|(key, value)| PartitionTag { key, value })
            .collect(),
    })
}

/// One page of a partition set's partitions
pub fn get_partitions(
    context: &dyn WorkspaceContext,
    handle: &RepositoryHandle,
    partition_set: &ExternalPartitionSet,
    cursor: Option<&str>,
    limit: Option<usize>,
    reverse: bool,
) -> Result<Partitions> {
    let location = context.get_repository_location(&handle.location_name)?;
    let names = location.get_external_partition_names(handle, &partition_set.name)?;
    let page = apply_cursor_limit_reverse(&names, cursor, limit, reverse)?;

    debug!(
        partition_set = %partition_set.name,
        total = names.len(),
        page = page.len(),
        ?cursor,
        ?limit,
        reverse,
        "Paged partitions"
    );

    Ok(Partitions {
        results: page
            .into_iter()
            .map(|name| Partition::new(partition_set, name))
            .collect(),
    })
}

/// Status of the latest run of every partition that has been run
///
/// Only runs launched from the set of the repository behind `handle` count.
pub fn get_partition_set_partition_statuses(
    context: &dyn WorkspaceContext,
    handle: &RepositoryHandle,
    partition_set_name: &str,
    job_name: &str,
) -> Result<PartitionStatuses> {
    let data = context.run_storage().get_run_partition_data(
        &handle.repository_name,
        partition_set_name,
        job_name,
    )?;

    Ok(PartitionStatuses {
        results: data
            .into_iter()
            .map(|p| PartitionStatus {
                id: format!("{}:{}", partition_set_name, p.partition),
                run_duration: match (p.start_time, p.end_time) {
                    (Some(start), Some(end)) => {
                        Some((end - start).num_milliseconds() as f64 / 1000.0)
                    }
                    _ => None,
                },
                partition_name: p.partition,
                run_status: p.status,
            })
            .collect(),
    })
}

/// Latest run of each partition, in partition order
pub fn get_partition_set_partition_runs(
    context: &dyn WorkspaceContext,
    partition_set: &ExternalPartitionSet,
) -> Result<Vec<PartitionRun>> {
    let location = context.get_repository_location(&partition_set.repository_handle.location_name)?;
    let partition_names = location
        .get_external_partition_names(&partition_set.repository_handle, &partition_set.name)?;
    let filter = RunsFilter::default()
        .with_tag(
            REPOSITORY_TAG,
            partition_set.repository_handle.repository_name.clone(),
        )
        .with_tag(PARTITION_SET_TAG, partition_set.name.clone());
    let records = context.run_storage().get_runs(&filter, None)?;

    // Records are newest first, so the first record seen for a partition wins
    let mut by_partition: HashMap<String, RunRecord> = HashMap::new();
    for record in records {
        let Some(partition) = record.tags.get(PARTITION_NAME_TAG).cloned() else {
            continue;
        };
        by_partition.entry(partition).or_insert(record);
    }

    Ok(partition_names
        .into_iter()
        .map(|partition_name| PartitionRun {
            id: format!("{}:{}", partition_set.name, partition_name),
            run: by_partition.remove(&partition_name),
            partition_name,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{InProcessRepositoryLocation, Workspace};
    use strata_core::PartitionsDefinition;
    use strata_runtime::partition_set::PartitionSetDefinition;
    use strata_runtime::{InMemoryRunStorage, JobDefinition, Repository};

    fn workspace() -> Workspace {
        let job = |name: &str| {
            JobDefinition::from_assets(
                name,
                vec![strata_core::AssetsDefinition::asset("a")
                    .partitions_def(PartitionsDefinition::static_keys(["x", "y", "z"]))
                    .build()],
                Default::default(),
            )
            .unwrap()
        };
        let repo = Repository::builder("repo")
            .job(job("job_b"))
            .job(job("job_a"))
            .partition_set(
                PartitionSetDefinition::new(
                    "alt_set",
                    "job_b",
                    PartitionsDefinition::static_keys(["x"]),
                )
                .with_tag(".strata/hidden", "1")
                .with_tag("owner", "data"),
            )
            .build()
            .unwrap();

        Workspace::new(Arc::new(InMemoryRunStorage::new())).with_location(Arc::new(
            InProcessRepositoryLocation::new("loc").with_repository(repo),
        ))
    }

    fn selector() -> RepositorySelector {
        RepositorySelector::new("loc", "repo")
    }

    #[test]
    fn test_partition_sets_for_pipeline_are_sorted() {
        let sets = get_partition_sets(&workspace(), &selector(), "job_b").unwrap();
        let names: Vec<_> = sets.results.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alt_set", "job_b_partition_set"]);
    }

    #[test]
    fn test_partition_set_not_found() {
        let result = get_partition_set(&workspace(), &selector(), "missing").unwrap();
        assert!(matches!(
            result,
            PartitionSetOrError::PartitionSetNotFound { ref partition_set_name, .. } if partition_set_name == "missing"
        ));

        let found = get_partition_set(&workspace(), &selector(), "job_a_partition_set").unwrap();
        assert!(matches!(found, PartitionSetOrError::PartitionSet(ref s) if s.pipeline_name == "job_a"));
    }

    #[test]
    fn test_hidden_tags_are_filtered() {
        let workspace = workspace();
        let handle = RepositoryHandle {
            location_name: "loc".into(),
            repository_name: "repo".into(),
        };
        let tags = get_partition_tags(&workspace, &handle, "alt_set", "x").unwrap();
        let keys: Vec<_> = tags.results.iter().map(|t| t.key.as_str()).collect();
        assert!(keys.contains(&"owner"));
        assert!(keys.contains(&PARTITION_NAME_TAG));
        assert!(keys.contains(&REPOSITORY_TAG));
        assert!(!keys.contains(&".strata/hidden"));
    }

    #[test]
    fn test_partition_config_is_pretty_json() {
        let workspace = workspace();
        let handle = RepositoryHandle {
            location_name: "loc".into(),
            repository_name: "repo".into(),
        };
        let config = get_partition_config(&workspace, &handle, "alt_set", "x").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&config.run_config).unwrap();
        assert_eq!(parsed["partition_key"], "x");
        assert!(config.run_config.contains('\n'));
    }

    #[test]
    fn test_unserializable_config_is_an_error() {
        let config = std::collections::BTreeMap::from([((1, 2), "tuple keys")]);
        let err = pretty_json(&config).unwrap_err();
        assert!(matches!(err, QueryError::Serialization(_)));
        assert!(err.to_string().starts_with("Failed to serialize run config"));
    }
}
