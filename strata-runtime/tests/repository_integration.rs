//! Integration tests for repositories, partition sets and run storage
//!
//! Runs partitioned base jobs of an asset group and checks what run storage
//! reports back per partition.
//!
//! Run with: cargo test --package strata-runtime --test repository_integration

use serde_json::json;
use std::sync::Arc;
use strata_core::{
    AssetsDefinition, ExecutorDefinition, PartitionsDefinition, ResourceDefinition,
    DEFAULT_IO_MANAGER_KEY, PARTITION_NAME_TAG, REPOSITORY_TAG,
};
use strata_runtime::{
    AssetGroup, ExecuteOptions, InMemoryRunStorage, Repository, RunStatus, RunStorage,
};

fn partitioned_group() -> AssetGroup {
    let partitions = PartitionsDefinition::static_keys(["a", "b", "c"]);
    AssetGroup::builder()
        .asset(
            AssetsDefinition::asset("upstream")
                .partitions_def(partitions.clone())
                .compute(|ctx| Ok(json!(ctx.partition_key())))
                .build(),
        )
        .asset(
            AssetsDefinition::asset("downstream")
                .input("upstream")
                .partitions_def(partitions)
                .compute(|ctx| Ok(ctx.input("upstream")?.clone()))
                .build(),
        )
        .resource(DEFAULT_IO_MANAGER_KEY, ResourceDefinition::mem_io_manager())
        .executor(ExecutorDefinition::InProcess)
        .build()
        .unwrap()
}

#[test]
fn test_partitioned_base_job_has_partition_set() {
    let repo = Repository::builder("repo")
        .asset_group(partitioned_group())
        .build()
        .unwrap();

    let jobs = repo.get_all_jobs();
    assert_eq!(jobs.len(), 1);
    assert!(AssetGroup::is_base_job_name(jobs[0].name()));
    assert_eq!(jobs[0].executor(), Some(&ExecutorDefinition::InProcess));

    let set = repo
        .get_partition_set("__ASSET_GROUP_partition_set")
        .unwrap();
    assert_eq!(set.job_name(), "__ASSET_GROUP");
}

#[test]
fn test_partition_runs_are_recorded_per_partition() {
    let repo = Repository::builder("repo")
        .asset_group(partitioned_group())
        .build()
        .unwrap();
    let job = repo.get_job("__ASSET_GROUP").unwrap();
    let set = &repo.partition_sets()[0];
    let storage = Arc::new(InMemoryRunStorage::new());

    for partition in ["a", "b", "a"] {
        let result = job
            .execute_in_process_with(
                ExecuteOptions::new()
                    .with_run_storage(storage.clone())
                    .with_tags(set.tags_for_partition(partition))
                    .with_partition_key(partition),
            )
            .unwrap();
        assert!(result.success());
        assert_eq!(result.output_for_node("downstream"), Some(&json!(partition)));
    }

    let data = storage
        .get_run_partition_data(repo.name(), set.name(), job.name())
        .unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0].partition, "a");
    assert_eq!(data[1].partition, "b");
    assert!(data.iter().all(|d| d.status == RunStatus::Success));

    let latest_a = storage.get_run(data[0].run_id).unwrap().unwrap();
    assert_eq!(latest_a.tags[PARTITION_NAME_TAG], "a");
    assert_eq!(latest_a.tags[REPOSITORY_TAG], "repo");
}

#[test]
fn test_unknown_partition_key_is_rejected() {
    let job = partitioned_group().base_jobs().unwrap().remove(0);
    let err = job
        .execute_in_process_with(ExecuteOptions::new().with_partition_key("z"))
        .unwrap_err();
    assert!(err.to_string().contains("'z'"));
}

#[test]
fn test_multiple_partitions_defs_split_base_jobs() {
    let group = AssetGroup::from_assets(vec![
        AssetsDefinition::asset("daily")
            .partitions_def(PartitionsDefinition::daily("2024-01-01").unwrap())
            .build(),
        AssetsDefinition::asset("static")
            .partitions_def(PartitionsDefinition::static_keys(["x"]))
            .build(),
        AssetsDefinition::asset("plain").build(),
    ])
    .unwrap();

    let repo = Repository::builder("repo").asset_group(group).build().unwrap();
    assert_eq!(repo.job_names(), vec!["__ASSET_GROUP_0", "__ASSET_GROUP_1"]);
    for job in repo.get_all_jobs() {
        assert_eq!(job.asset_keys().len(), 2);
        assert!(job.node("plain").is_some());
    }
    assert_eq!(repo.partition_sets().len(), 2);
}
