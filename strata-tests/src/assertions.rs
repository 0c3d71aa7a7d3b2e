//! Custom assertions for common verification patterns
//!
//! Keys are given as `>` separated user strings so expectations read the same
//! way selections are written.

use std::collections::BTreeSet;
use strata_core::AssetKey;
use strata_runtime::{ExecutionResult, JobDefinition};

/// Parse user strings into a key set
pub fn keys(user_strings: &[&str]) -> BTreeSet<AssetKey> {
    user_strings
        .iter()
        .map(|s| AssetKey::from_user_string(s))
        .collect()
}

/// Assert a job plans exactly `expected`
pub fn assert_job_keys(job: &JobDefinition, expected: &[&str]) {
    assert_eq!(
        job.asset_keys(),
        &keys(expected),
        "Job '{}' selects the wrong assets",
        job.name()
    );
}

/// Assert a run planned and materialized exactly `expected`
pub fn assert_materialized(result: &ExecutionResult, expected: &[&str]) {
    let expected = keys(expected);

    let planned: BTreeSet<AssetKey> = result.planned_asset_keys().into_iter().cloned().collect();
    assert_eq!(planned, expected, "Run of '{}' planned the wrong assets", result.job_name());

    let materialized: BTreeSet<AssetKey> = result
        .materialized_asset_keys()
        .into_iter()
        .cloned()
        .collect();
    assert_eq!(
        materialized,
        expected,
        "Run of '{}' materialized the wrong assets",
        result.job_name()
    );
}

/// Assert an error message contains `fragment`
pub fn assert_error_contains<E: std::fmt::Display>(error: &E, fragment: &str) {
    let message = error.to_string();
    assert!(
        message.contains(fragment),
        "Expected error containing {:?}, got {:?}",
        fragment,
        message
    );
}
