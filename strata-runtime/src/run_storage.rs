//! Run storage
//!
//! Records runs, their tags and their event logs. Run records are returned
//! newest first.

use crate::events::{RunEvent, RunEventKind};
use crate::state_machine::RunStatus;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use strata_core::{PARTITION_NAME_TAG, PARTITION_SET_TAG, REPOSITORY_TAG};
use uuid::Uuid;

/// A run and its lifecycle timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub job_name: String,
    pub status: RunStatus,
    pub tags: BTreeMap<String, String>,
    pub create_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl RunRecord {
    pub fn new(run_id: Uuid, job_name: impl Into<String>, tags: BTreeMap<String, String>) -> Self {
        Self {
            run_id,
            job_name: job_name.into(),
            status: RunStatus::NotStarted,
            tags,
            create_time: Utc::now(),
            start_time: None,
            end_time: None,
        }
    }

    pub fn partition(&self) -> Option<&str> {
        self.tags.get(PARTITION_NAME_TAG).map(String::as_str)
    }
}

/// Filter for run queries; every set field must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunsFilter {
    pub job_name: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub statuses: Vec<RunStatus>,
}

impl RunsFilter {
    pub fn for_job(job_name: impl Into<String>) -> Self {
        Self {
            job_name: Some(job_name.into()),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, record: &RunRecord) -> bool {
        if let Some(job_name) = &self.job_name {
            if &record.job_name != job_name {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&record.status) {
            return false;
        }
        self.tags
            .iter()
            .all(|(key, value)| record.tags.get(key) == Some(value))
    }
}

/// Latest run of one partition of a partition set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPartitionData {
    pub run_id: Uuid,
    pub partition: String,
    pub status: RunStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Persists runs and run events
pub trait RunStorage: Send + Sync {
    /// Record a new run
    fn add_run(&self, record: RunRecord) -> Result<()>;

    /// Append an event, updating the run's status and timestamps
    fn handle_run_event(&self, event: RunEvent) -> Result<()>;

    fn get_run(&self, run_id: Uuid) -> Result<Option<RunRecord>>;

    /// Runs matching `filter`, newest first
    fn get_runs(&self, filter: &RunsFilter, limit: Option<usize>) -> Result<Vec<RunRecord>>;

    /// Event log of a run, in emission order
    fn get_events(&self, run_id: Uuid) -> Result<Vec<RunEvent>>;

    /// Latest run per partition for runs of `job_name` launched from
    /// `partition_set_name` of `repository_name`
    fn get_run_partition_data(
        &self,
        repository_name: &str,
        partition_set_name: &str,
        job_name: &str,
    ) -> Result<Vec<RunPartitionData>> {
        let filter = RunsFilter::for_job(job_name)
            .with_tag(REPOSITORY_TAG, repository_name)
            .with_tag(PARTITION_SET_TAG, partition_set_name);
        let mut seen = HashSet::new();
        let mut data = Vec::new();
        for record in self.get_runs(&filter, None)? {
            let Some(partition) = record.partition() else {
                continue;
            };
            if !seen.insert(partition.to_string()) {
                continue;
            }
            data.push(RunPartitionData {
                run_id: record.run_id,
                partition: partition.to_string(),
                status: record.status,
                start_time: record.start_time,
                end_time: record.end_time,
            });
        }
        Ok(data)
    }
}

/// Keeps runs and events in memory
#[derive(Default)]
pub struct InMemoryRunStorage {
    // Insertion order, oldest first
    runs: RwLock<Vec<RunRecord>>,
    events: RwLock<HashMap<Uuid, Vec<RunEvent>>>,
}

impl InMemoryRunStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events of every run, in emission order per run and run creation order
    pub fn all_events(&self) -> Vec<RunEvent> {
        let runs = self.runs.read();
        let events = self.events.read();
        runs.iter()
            .filter_map(|run| events.get(&run.run_id))
            .flatten()
            .cloned()
            .collect()
    }
}

impl RunStorage for InMemoryRunStorage {
    fn add_run(&self, record: RunRecord) -> Result<()> {
        let mut runs = self.runs.write();
        if runs.iter().any(|r| r.run_id == record.run_id) {
            return Err(Error::RunStorage(format!(
                "Run {} already exists",
                record.run_id
            )));
        }
        runs.push(record);
        Ok(())
    }

    fn handle_run_event(&self, event: RunEvent) -> Result<()> {
        {
            let mut runs = self.runs.write();
            let record = runs
                .iter_mut()
                .find(|r| r.run_id == event.run_id)
                .ok_or_else(|| Error::RunStorage(format!("Unknown run {}", event.run_id)))?;

            match &event.kind {
                RunEventKind::RunStart => {
                    record.status = RunStatus::Started;
                    record.start_time = Some(event.timestamp);
                }
                RunEventKind::RunSuccess => {
                    record.status = RunStatus::Success;
                    record.end_time = Some(event.timestamp);
                }
                RunEventKind::RunFailure { .. } => {
                    record.status = RunStatus::Failure;
                    record.end_time = Some(event.timestamp);
                }
                _ => {}
            }
        }

        self.events
            .write()
            .entry(event.run_id)
            .or_default()
            .push(event);
        Ok(())
    }

    fn get_run(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        Ok(self
            .runs
            .read()
            .iter()
            .find(|r| r.run_id == run_id)
            .cloned())
    }

    fn get_runs(&self, filter: &RunsFilter, limit: Option<usize>) -> Result<Vec<RunRecord>> {
        let runs = self.runs.read();
        let matching = runs.iter().rev().filter(|r| filter.matches(r)).cloned();
        Ok(match limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    fn get_events(&self, run_id: Uuid) -> Result<Vec<RunEvent>> {
        Ok(self
            .events
            .read()
            .get(&run_id)
            .cloned()
            .unwrap_or_default())
    }
}
