//! Integration tests for partition set resolvers
//!
//! Builds an in-process workspace around a partitioned asset group, launches
//! partition runs against the workspace's run storage and checks what the
//! resolvers report.
//!
//! Run with: cargo test --package strata-query --test partition_sets_integration

use serde_json::json;
use std::sync::Arc;
use strata_core::{
    AssetsDefinition, PartitionsDefinition, ResourceDefinition, DEFAULT_IO_MANAGER_KEY,
};
use strata_query::partition_sets::{
    get_partition_by_name, get_partition_set_partition_runs,
    get_partition_set_partition_statuses, get_partitions,
};
use strata_query::{
    ExternalPartitionSet, InProcessRepositoryLocation, QueryError, RepositoryHandle,
    RepositoryLocation, Workspace,
};
use strata_runtime::{
    AssetGroup, ExecuteOptions, InMemoryRunStorage, Repository, RunStatus, RunStorage,
    RunsFilter,
};

const JOB_NAME: &str = "__ASSET_GROUP";
const SET_NAME: &str = "__ASSET_GROUP_partition_set";

struct Fixture {
    workspace: Workspace,
    storage: Arc<InMemoryRunStorage>,
    partition_set: ExternalPartitionSet,
    repo: Repository,
    other_repo: Repository,
}

/// Repository around a ten-partition asset whose `p3` partition fails
fn partitioned_repo(name: &str) -> Repository {
    let keys: Vec<String> = (0..10).map(|i| format!("p{}", i)).collect();
    let group = AssetGroup::builder()
        .asset(
            AssetsDefinition::asset("numbers")
                .partitions_def(PartitionsDefinition::static_keys(keys))
                .compute(|ctx| match ctx.partition_key() {
                    Some("p3") => Err(strata_core::Error::Execution("bad partition".into())),
                    key => Ok(json!(key)),
                })
                .build(),
        )
        .resource(DEFAULT_IO_MANAGER_KEY, ResourceDefinition::mem_io_manager())
        .build()
        .unwrap();
    Repository::builder(name).asset_group(group).build().unwrap()
}

fn launch(repo: &Repository, storage: &Arc<InMemoryRunStorage>, partition: &str) -> bool {
    let set = repo.get_partition_set(SET_NAME).unwrap();
    repo.get_job(JOB_NAME)
        .unwrap()
        .execute_in_process_with(
            ExecuteOptions::new()
                .with_run_storage(storage.clone())
                .with_tags(set.tags_for_partition(partition))
                .with_partition_key(partition),
        )
        .unwrap()
        .success()
}

impl Fixture {
    fn new() -> Self {
        let repo = partitioned_repo("repo");
        let other_repo = partitioned_repo("other_repo");

        let location = Arc::new(
            InProcessRepositoryLocation::new("loc")
                .with_repository(repo.clone())
                .with_repository(other_repo.clone()),
        );
        let handle = location.get_repository("repo").unwrap();
        let partition_set = location
            .get_external_partition_sets(&handle)
            .unwrap()
            .into_iter()
            .find(|set| set.name == SET_NAME)
            .unwrap();

        let storage = Arc::new(InMemoryRunStorage::new());
        let workspace = Workspace::new(storage.clone()).with_location(location);
        Self {
            workspace,
            storage,
            partition_set,
            repo,
            other_repo,
        }
    }

    fn launch(&self, partition: &str) -> bool {
        launch(&self.repo, &self.storage, partition)
    }

    fn launch_elsewhere(&self, partition: &str) -> bool {
        launch(&self.other_repo, &self.storage, partition)
    }
}

#[test]
fn test_get_partitions_pages() {
    let fixture = Fixture::new();
    let set = &fixture.partition_set;
    let handle = &set.repository_handle;

    let forward = get_partitions(&fixture.workspace, handle, set, Some("p4"), Some(3), false)
        .unwrap();
    let names: Vec<_> = forward.results.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["p5", "p6", "p7"]);

    let backward = get_partitions(&fixture.workspace, handle, set, Some("p4"), Some(3), true)
        .unwrap();
    let names: Vec<_> = backward.results.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["p1", "p2", "p3"]);

    let err = get_partitions(&fixture.workspace, handle, set, Some("nope"), None, false)
        .unwrap_err();
    assert!(matches!(err, QueryError::CursorNotFound(_)));

    let partition = get_partition_by_name(set, "p3");
    assert_eq!(partition.partition_set_name, SET_NAME);
    assert_eq!(partition.pipeline_name, JOB_NAME);
}

#[test]
fn test_partition_runs_latest_first_seen_wins() {
    let fixture = Fixture::new();
    assert!(fixture.launch("p1"));
    assert!(!fixture.launch("p3"));
    assert!(fixture.launch("p1"));

    let runs = get_partition_set_partition_runs(&fixture.workspace, &fixture.partition_set)
        .unwrap();
    assert_eq!(runs.len(), 10);
    assert_eq!(runs[0].id, format!("{}:p0", SET_NAME));
    assert!(runs[0].run.is_none());

    let p1_runs = fixture
        .storage
        .get_runs(&RunsFilter::for_job(JOB_NAME), None)
        .unwrap();
    let latest_p1 = p1_runs
        .iter()
        .find(|r| r.partition() == Some("p1"))
        .unwrap();
    assert_eq!(runs[1].run.as_ref().map(|r| r.run_id), Some(latest_p1.run_id));
    assert_eq!(
        runs[3].run.as_ref().map(|r| r.status),
        Some(RunStatus::Failure)
    );
}

#[test]
fn test_partition_statuses() {
    let fixture = Fixture::new();
    assert!(fixture.launch("p0"));
    assert!(!fixture.launch("p3"));

    let handle = &fixture.partition_set.repository_handle;
    let statuses =
        get_partition_set_partition_statuses(&fixture.workspace, handle, SET_NAME, JOB_NAME)
            .unwrap();
    assert_eq!(statuses.results.len(), 2);

    let p3 = &statuses.results[0];
    assert_eq!(p3.id, format!("{}:p3", SET_NAME));
    assert_eq!(p3.run_status, RunStatus::Failure);
    assert!(p3.run_duration.unwrap() >= 0.0);

    let p0 = &statuses.results[1];
    assert_eq!(p0.partition_name, "p0");
    assert_eq!(p0.run_status, RunStatus::Success);

    let json = serde_json::to_value(p0).unwrap();
    assert_eq!(json["runStatus"], "SUCCESS");
    assert_eq!(json["partitionName"], "p0");
}

#[test]
fn test_partition_data_is_scoped_to_repository() {
    let fixture = Fixture::new();
    assert!(fixture.launch("p0"));
    assert!(!fixture.launch_elsewhere("p3"));
    assert!(fixture.launch_elsewhere("p5"));

    let handle = &fixture.partition_set.repository_handle;
    let statuses =
        get_partition_set_partition_statuses(&fixture.workspace, handle, SET_NAME, JOB_NAME)
            .unwrap();
    let names: Vec<_> = statuses
        .results
        .iter()
        .map(|s| s.partition_name.as_str())
        .collect();
    assert_eq!(names, vec!["p0"]);

    let other_handle = RepositoryHandle {
        location_name: "loc".into(),
        repository_name: "other_repo".into(),
    };
    let other =
        get_partition_set_partition_statuses(&fixture.workspace, &other_handle, SET_NAME, JOB_NAME)
            .unwrap();
    let names: Vec<_> = other.results.iter().map(|s| s.partition_name.as_str()).collect();
    assert_eq!(names, vec!["p5", "p3"]);

    let runs = get_partition_set_partition_runs(&fixture.workspace, &fixture.partition_set)
        .unwrap();
    let with_runs: Vec<_> = runs
        .iter()
        .filter(|r| r.run.is_some())
        .map(|r| r.partition_name.as_str())
        .collect();
    assert_eq!(with_runs, vec!["p0"]);
}
