//! Repositories
//!
//! A repository is the unit a workspace loads: the jobs built from its asset
//! groups, explicitly provided jobs, and the partition sets of every
//! partitioned job.

use crate::group::AssetGroup;
use crate::job::JobDefinition;
use crate::partition_set::PartitionSetDefinition;
use crate::Result;
use std::collections::HashSet;
use strata_core::Error;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Repository {
    name: String,
    asset_group: Option<AssetGroup>,
    jobs: Vec<JobDefinition>,
    partition_sets: Vec<PartitionSetDefinition>,
}

impl Repository {
    pub fn builder(name: impl Into<String>) -> RepositoryBuilder {
        RepositoryBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Union of every asset group the repository was built with
    pub fn asset_group(&self) -> Option<&AssetGroup> {
        self.asset_group.as_ref()
    }

    /// Asset group jobs first, then explicit jobs in the order provided
    pub fn get_all_jobs(&self) -> &[JobDefinition] {
        &self.jobs
    }

    pub fn get_job(&self, name: &str) -> Option<&JobDefinition> {
        self.jobs.iter().find(|job| job.name() == name)
    }

    pub fn has_job(&self, name: &str) -> bool {
        self.get_job(name).is_some()
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(JobDefinition::name).collect()
    }

    pub fn partition_sets(&self) -> &[PartitionSetDefinition] {
        &self.partition_sets
    }

    pub fn get_partition_set(&self, name: &str) -> Option<&PartitionSetDefinition> {
        self.partition_sets.iter().find(|set| set.name() == name)
    }
}

pub struct RepositoryBuilder {
    name: String,
    asset_groups: Vec<AssetGroup>,
    jobs: Vec<JobDefinition>,
    partition_sets: Vec<PartitionSetDefinition>,
}

impl RepositoryBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asset_groups: Vec::new(),
            jobs: Vec::new(),
            partition_sets: Vec::new(),
        }
    }

    /// Add an asset group; several groups are merged and must share resources
    pub fn asset_group(mut self, group: AssetGroup) -> Self {
        self.asset_groups.push(group);
        self
    }

    pub fn job(mut self, job: JobDefinition) -> Self {
        self.jobs.push(job);
        self
    }

    /// Add a partition set in addition to the ones derived from partitioned jobs
    pub fn partition_set(mut self, partition_set: PartitionSetDefinition) -> Self {
        self.partition_sets.push(partition_set);
        self
    }

    pub fn build(self) -> Result<Repository> {
        for job in &self.jobs {
            if AssetGroup::is_base_job_name(job.name()) {
                return Err(Error::InvalidDefinition(format!(
                    "Attempted to provide job called {} to repository, which is a reserved name.",
                    job.name()
                ))
                .into());
            }
        }

        let mut groups = self.asset_groups.into_iter();
        let asset_group = match groups.next() {
            Some(first) => Some(groups.try_fold(first, |merged, group| merged.merge(&group))?),
            None => None,
        };

        let mut jobs = match &asset_group {
            Some(group) => group.base_jobs()?,
            None => Vec::new(),
        };
        jobs.extend(self.jobs);

        let mut job_names = HashSet::new();
        for job in &jobs {
            if !job_names.insert(job.name()) {
                return Err(Error::InvalidDefinition(format!(
                    "Duplicate job definition found for job '{}' in repository '{}'",
                    job.name(),
                    self.name
                ))
                .into());
            }
        }

        let mut partition_sets: Vec<PartitionSetDefinition> =
            jobs.iter().filter_map(PartitionSetDefinition::for_job).collect();
        partition_sets.extend(self.partition_sets);
        let partition_sets: Vec<PartitionSetDefinition> = partition_sets
            .into_iter()
            .map(|set| set.in_repository(&self.name))
            .collect();

        let mut set_names = HashSet::new();
        for partition_set in &partition_sets {
            if !job_names.contains(partition_set.job_name()) {
                return Err(Error::InvalidDefinition(format!(
                    "Partition set '{}' targets job '{}', which is not in repository '{}'",
                    partition_set.name(),
                    partition_set.job_name(),
                    self.name
                ))
                .into());
            }
            if !set_names.insert(partition_set.name()) {
                return Err(Error::InvalidDefinition(format!(
                    "Duplicate partition set definition found for partition set '{}' in repository '{}'",
                    partition_set.name(),
                    self.name
                ))
                .into());
            }
        }

        debug!(
            repository = %self.name,
            jobs = ?jobs.iter().map(JobDefinition::name).collect::<Vec<_>>(),
            partition_sets = partition_sets.len(),
            "Built repository"
        );

        Ok(Repository {
            name: self.name,
            asset_group,
            jobs,
            partition_sets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use strata_core::{AssetsDefinition, PartitionsDefinition};

    fn group() -> AssetGroup {
        AssetGroup::from_assets(vec![
            AssetsDefinition::asset("a").build(),
            AssetsDefinition::asset("b").input("a").build(),
        ])
        .unwrap()
    }

    #[test]
    fn test_asset_group_contributes_base_job() {
        let repo = Repository::builder("repo").asset_group(group()).build().unwrap();
        assert_eq!(repo.job_names(), vec!["__ASSET_GROUP"]);
        assert!(repo.partition_sets().is_empty());
    }

    #[test]
    fn test_reserved_job_name_rejected() {
        let base = group().base_jobs().unwrap().remove(0);
        let err = Repository::builder("repo").job(base).build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Attempted to provide job called __ASSET_GROUP to repository, which is a reserved name."
        );
    }

    #[test]
    fn test_duplicate_job_names_rejected() {
        let job = group().build_job("my_job", None).unwrap();
        let err = Repository::builder("repo")
            .job(job.clone())
            .job(job)
            .build()
            .unwrap_err();
        assert!(err.is_invalid_definition());
    }

    #[test]
    fn test_partitioned_job_gets_partition_set() {
        let job = JobDefinition::from_assets(
            "daily_job",
            vec![AssetsDefinition::asset("a")
                .partitions_def(PartitionsDefinition::static_keys(["x"]))
                .build()],
            BTreeMap::new(),
        )
        .unwrap();
        let repo = Repository::builder("repo").job(job).build().unwrap();

        let set = repo.get_partition_set("daily_job_partition_set").unwrap();
        assert_eq!(set.job_name(), "daily_job");
        assert_eq!(set.repository_name(), Some("repo"));
        assert!(repo.get_partition_set("missing").is_none());
    }
}
