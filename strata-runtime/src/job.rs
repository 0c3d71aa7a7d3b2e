//! Job definitions
//!
//! A job is the executable form of a set of asset definitions: nodes in
//! dependency order, each input wired either to an output produced earlier in
//! the same job or to an IO manager load of a previously materialized asset.

use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use strata_core::{
    AssetKey, AssetsDefinition, ExecutorDefinition, PartitionsDefinition, ResourceDefinition,
    SourceAsset, DEFAULT_IO_MANAGER_KEY,
};
use tracing::debug;

/// Where an input's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Output of another node in the same job
    Upstream {
        node_name: String,
        output_name: String,
    },

    /// Value materialized outside this job
    External,
}

/// Resolved wiring of one node input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputWiring {
    pub input_name: String,
    pub asset_key: AssetKey,

    /// IO manager the value is loaded with
    pub io_manager_key: String,

    pub source: InputSource,
}

/// A node of a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobNode {
    pub definition: AssetsDefinition,
    pub inputs: Vec<InputWiring>,
}

impl JobNode {
    pub fn name(&self) -> &str {
        self.definition.node_name()
    }

    /// Nodes this node reads outputs from
    pub fn upstream_nodes(&self) -> BTreeSet<&str> {
        self.inputs
            .iter()
            .filter_map(|wiring| match &wiring.source {
                InputSource::Upstream { node_name, .. } => Some(node_name.as_str()),
                InputSource::External => None,
            })
            .collect()
    }
}

/// Everything needed to assemble a job
pub(crate) struct JobAssembly<'a> {
    pub name: String,

    /// Definitions in the job, already restricted to their selected keys
    pub included: Vec<AssetsDefinition>,

    /// Every definition known to the caller, for outputs produced outside the job
    pub context_assets: &'a [AssetsDefinition],

    pub source_assets: &'a [SourceAsset],
    pub resource_defs: BTreeMap<String, ResourceDefinition>,
    pub executor: Option<ExecutorDefinition>,
}

/// An executable job
#[derive(Debug, Clone, PartialEq)]
pub struct JobDefinition {
    name: String,
    nodes: Vec<JobNode>,
    asset_keys: BTreeSet<AssetKey>,
    resource_defs: BTreeMap<String, ResourceDefinition>,
    executor: Option<ExecutorDefinition>,
    partitions_def: Option<PartitionsDefinition>,
}

impl JobDefinition {
    /// Build a job running every given definition in full
    pub fn from_assets(
        name: impl Into<String>,
        assets: Vec<AssetsDefinition>,
        resource_defs: BTreeMap<String, ResourceDefinition>,
    ) -> Result<Self> {
        let context = assets.clone();
        Self::assemble(JobAssembly {
            name: name.into(),
            included: assets,
            context_assets: &context,
            source_assets: &[],
            resource_defs,
            executor: None,
        })
    }

    pub(crate) fn assemble(assembly: JobAssembly<'_>) -> Result<Self> {
        let JobAssembly {
            name,
            included,
            context_assets,
            source_assets,
            mut resource_defs,
            executor,
        } = assembly;

        resource_defs
            .entry(DEFAULT_IO_MANAGER_KEY.to_string())
            .or_insert_with(ResourceDefinition::default_io_manager);

        let mut node_names = HashSet::new();
        for asset in &included {
            if !node_names.insert(asset.node_name()) {
                return Err(strata_core::Error::InvalidDefinition(format!(
                    "Job '{}' contains more than one node named '{}'",
                    name,
                    asset.node_name()
                ))
                .into());
            }
        }

        let partitions_def = job_partitions_def(&name, &included)?;

        // Selected outputs of in-job nodes
        let mut produced_in_job: HashMap<&AssetKey, (&str, &str, &str)> = HashMap::new();
        for asset in &included {
            for out in asset.selected_outputs() {
                produced_in_job.insert(
                    &out.asset_key,
                    (asset.node_name(), out.name.as_str(), out.io_manager_key.as_str()),
                );
            }
        }

        // IO manager keys of everything materialized outside the job
        let mut external_io_managers: HashMap<&AssetKey, &str> = HashMap::new();
        for source in source_assets {
            external_io_managers.insert(&source.key, source.io_manager_key.as_str());
        }
        for asset in context_assets.iter().chain(included.iter()) {
            for out in asset.outputs() {
                external_io_managers.insert(&out.asset_key, out.io_manager_key.as_str());
            }
        }

        let mut nodes = Vec::with_capacity(included.len());
        for asset in &included {
            let inputs = asset
                .inputs()
                .iter()
                .map(|input| {
                    let wiring = match produced_in_job.get(&input.asset_key) {
                        Some(&(node_name, output_name, io_manager_key))
                            if node_name != asset.node_name() =>
                        {
                            InputWiring {
                                input_name: input.name.clone(),
                                asset_key: input.asset_key.clone(),
                                io_manager_key: io_manager_key.to_string(),
                                source: InputSource::Upstream {
                                    node_name: node_name.to_string(),
                                    output_name: output_name.to_string(),
                                },
                            }
                        }
                        _ => InputWiring {
                            input_name: input.name.clone(),
                            asset_key: input.asset_key.clone(),
                            io_manager_key: external_io_managers
                                .get(&input.asset_key)
                                .copied()
                                .unwrap_or(DEFAULT_IO_MANAGER_KEY)
                                .to_string(),
                            source: InputSource::External,
                        },
                    };
                    debug!(
                        job = %name,
                        node = asset.node_name(),
                        input = %wiring.input_name,
                        source = ?wiring.source,
                        io_manager = %wiring.io_manager_key,
                        "Wired input"
                    );
                    wiring
                })
                .collect();

            nodes.push(JobNode {
                definition: asset.clone(),
                inputs,
            });
        }

        let nodes = topological_sort(&name, nodes)?;
        let asset_keys = included
            .iter()
            .flat_map(|asset| asset.asset_keys().iter().cloned())
            .collect();

        Ok(Self {
            name,
            nodes,
            asset_keys,
            resource_defs,
            executor,
            partitions_def,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nodes in execution order
    pub fn nodes(&self) -> &[JobNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&JobNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(JobNode::name).collect()
    }

    /// Keys the job plans to materialize
    pub fn asset_keys(&self) -> &BTreeSet<AssetKey> {
        &self.asset_keys
    }

    pub fn resource_defs(&self) -> &BTreeMap<String, ResourceDefinition> {
        &self.resource_defs
    }

    pub fn executor(&self) -> Option<&ExecutorDefinition> {
        self.executor.as_ref()
    }

    pub fn partitions_def(&self) -> Option<&PartitionsDefinition> {
        self.partitions_def.as_ref()
    }
}

fn job_partitions_def(
    job_name: &str,
    assets: &[AssetsDefinition],
) -> Result<Option<PartitionsDefinition>> {
    let mut found: Option<&PartitionsDefinition> = None;
    for asset in assets {
        let Some(partitions_def) = asset.partitions_def() else {
            continue;
        };
        match found {
            Some(existing) if existing != partitions_def => {
                return Err(strata_core::Error::InvalidDefinition(format!(
                    "Job '{}' contains assets with different partitions definitions",
                    job_name
                ))
                .into());
            }
            Some(_) => {}
            None => found = Some(partitions_def),
        }
    }
    Ok(found.cloned())
}

/// Kahn's algorithm over node-level dependencies; ties keep declaration order
fn topological_sort(job_name: &str, nodes: Vec<JobNode>) -> Result<Vec<JobNode>> {
    let index_by_name: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.name(), idx))
        .collect();

    let mut indegree = vec![0_usize; nodes.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (idx, node) in nodes.iter().enumerate() {
        for upstream in node.upstream_nodes() {
            if let Some(&parent) = index_by_name.get(upstream) {
                children[parent].push(idx);
                indegree[idx] += 1;
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(nodes.len());

    while let Some(idx) = ready.pop_front() {
        ordered.push(idx);
        for &child in &children[idx] {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                ready.push_back(child);
            }
        }
    }

    if ordered.len() != nodes.len() {
        let stuck: Vec<&str> = (0..nodes.len())
            .filter(|i| indegree[*i] > 0)
            .map(|i| nodes[i].name())
            .collect();
        return Err(Error::Core(strata_core::Error::InvalidDefinition(format!(
            "Circular dependency detected in job '{}' between nodes {}",
            job_name,
            strata_core::key::format_names(stuck)
        ))));
    }

    let mut slots: Vec<Option<JobNode>> = nodes.into_iter().map(Some).collect();
    Ok(ordered
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect())
}
