//! Partitions command
//!
//! Pages through the partitions of a job's partition sets, the same way
//! workspace clients do.

use anyhow::Result;
use std::sync::Arc;
use strata_query::partition_sets::get_partitions;
use strata_query::{
    InProcessRepositoryLocation, Workspace, WorkspaceContext,
};
use strata_runtime::{AssetGroup, InMemoryRunStorage, Repository};

const LOCATION_NAME: &str = "manifest";
const REPOSITORY_NAME: &str = "manifest";

pub fn execute(
    group: AssetGroup,
    job_name: &str,
    cursor: Option<&str>,
    limit: Option<usize>,
    reverse: bool,
) -> Result<()> {
    let repository = Repository::builder(REPOSITORY_NAME)
        .asset_group(group)
        .build()?;
    let workspace = Workspace::new(Arc::new(InMemoryRunStorage::new())).with_location(Arc::new(
        InProcessRepositoryLocation::new(LOCATION_NAME).with_repository(repository),
    ));

    let location = workspace.get_repository_location(LOCATION_NAME)?;
    let handle = location.get_repository(REPOSITORY_NAME)?;
    let partition_sets: Vec<_> = location
        .get_external_partition_sets(&handle)?
        .into_iter()
        .filter(|set| set.pipeline_name == job_name)
        .collect();
    if partition_sets.is_empty() {
        anyhow::bail!("Job '{}' has no partition set", job_name);
    }

    for set in &partition_sets {
        let page = get_partitions(&workspace, &handle, set, cursor, limit, reverse)?;
        println!("Partition set: {} ({} shown)", set.name, page.results.len());
        for partition in &page.results {
            println!("  {}", partition.name);
        }
    }

    Ok(())
}
