//! Asset groups
//!
//! An [`AssetGroup`] collects asset definitions, source assets, the resources
//! they need and an optional executor. Groups are validated when built and
//! never change afterwards; every job built from a group is independent.

use crate::execution::ExecutionResult;
use crate::job::{JobAssembly, JobDefinition};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::Add;
use strata_core::key::{format_keys, format_names};
use strata_core::{
    AssetKey, AssetsDefinition, Error, ExecutorDefinition, PartitionsDefinition,
    ResourceDefinition, SourceAsset, DEFAULT_IO_MANAGER_KEY,
};
use strata_lineage::{AssetGraph, Selection, SelectionResolver};
use tracing::{debug, info};

/// Name of the job a repository builds for an asset group. Job names starting
/// with it are reserved.
pub const BASE_JOB_NAME: &str = "__ASSET_GROUP";

/// Name of the job built by [`AssetGroup::materialize`]
pub const EPHEMERAL_JOB_NAME: &str = "__ephemeral_asset_job__";

/// A validated collection of assets and the resources they need
#[derive(Debug, Clone)]
pub struct AssetGroup {
    assets: Vec<AssetsDefinition>,
    source_assets: Vec<SourceAsset>,
    resource_defs: BTreeMap<String, ResourceDefinition>,
    executor: Option<ExecutorDefinition>,
}

impl AssetGroup {
    /// Validate and build a group
    ///
    /// `io_manager` is bound to the shared default IO manager unless provided.
    pub fn new(
        assets: Vec<AssetsDefinition>,
        source_assets: Vec<SourceAsset>,
        resource_defs: BTreeMap<String, ResourceDefinition>,
        executor: Option<ExecutorDefinition>,
    ) -> Result<Self> {
        let mut resource_defs = resource_defs;
        resource_defs
            .entry(DEFAULT_IO_MANAGER_KEY.to_string())
            .or_insert_with(ResourceDefinition::default_io_manager);

        let group = Self {
            assets,
            source_assets,
            resource_defs,
            executor,
        };
        group.validate()?;

        debug!(
            assets = group.assets.len(),
            source_assets = group.source_assets.len(),
            resources = ?group.resource_defs.keys().collect::<Vec<_>>(),
            "Built asset group"
        );
        Ok(group)
    }

    /// Group with only assets, default resources and no executor
    pub fn from_assets(assets: Vec<AssetsDefinition>) -> Result<Self> {
        Self::new(assets, Vec::new(), BTreeMap::new(), None)
    }

    pub fn builder() -> AssetGroupBuilder {
        AssetGroupBuilder::default()
    }

    fn validate(&self) -> Result<()> {
        let provided: BTreeSet<&str> = self.resource_defs.keys().map(String::as_str).collect();

        let mut seen_keys: HashMap<&AssetKey, &str> = HashMap::new();
        for asset in &self.assets {
            for out in asset.outputs() {
                if let Some(previous) = seen_keys.insert(&out.asset_key, asset.node_name()) {
                    return Err(Error::InvalidDefinition(format!(
                        "Asset key {} is defined multiple times. Definitions found in nodes: {}",
                        out.asset_key,
                        format_names([previous, asset.node_name()])
                    ))
                    .into());
                }
            }
        }

        for asset in &self.assets {
            let available: BTreeSet<&str> = provided
                .iter()
                .copied()
                .chain(asset.resource_defs().keys().map(String::as_str))
                .collect();

            let missing: Vec<&str> = asset
                .required_resource_keys()
                .iter()
                .map(String::as_str)
                .filter(|key| !available.contains(key))
                .collect();
            if !missing.is_empty() {
                return Err(Error::InvalidDefinition(format!(
                    "AssetGroup is missing required resource keys for asset '{}'. Missing resource keys: {}",
                    asset.node_name(),
                    format_names(missing)
                ))
                .into());
            }

            for out in asset.outputs() {
                if !available.contains(out.io_manager_key.as_str()) {
                    return Err(Error::InvalidDefinition(format!(
                        "Output '{}' with AssetKey '{}' requires io manager '{}' but was not provided on asset group. Provided resources: {}",
                        out.name,
                        out.asset_key,
                        out.io_manager_key,
                        format_names(provided.iter().copied())
                    ))
                    .into());
                }
            }
        }

        for source in &self.source_assets {
            if !provided.contains(source.io_manager_key.as_str()) {
                return Err(Error::InvalidDefinition(format!(
                    "SourceAsset with key {} requires io manager with key '{}', which was not provided on AssetGroup. Provided keys: {}",
                    source.key,
                    source.io_manager_key,
                    format_names(provided.iter().copied())
                ))
                .into());
            }
        }

        Ok(())
    }

    pub fn assets(&self) -> &[AssetsDefinition] {
        &self.assets
    }

    pub fn source_assets(&self) -> &[SourceAsset] {
        &self.source_assets
    }

    pub fn resource_defs(&self) -> &BTreeMap<String, ResourceDefinition> {
        &self.resource_defs
    }

    pub fn executor(&self) -> Option<&ExecutorDefinition> {
        self.executor.as_ref()
    }

    /// Dependency graph of the group's assets and source assets
    pub fn asset_graph(&self) -> AssetGraph {
        AssetGraph::from_definitions(&self.assets, &self.source_assets)
    }

    /// Keys selected by `selection`; every produced key when `None`
    pub fn resolve_selection(&self, selection: Option<&Selection>) -> Result<BTreeSet<AssetKey>> {
        let graph = self.asset_graph();
        let resolver = SelectionResolver::new(&graph);
        let selection = selection.cloned().unwrap_or_else(Selection::all);
        Ok(resolver.resolve(&selection)?)
    }

    /// Whether `name` is reserved for jobs built from asset groups
    pub fn is_base_job_name(name: &str) -> bool {
        name.starts_with(BASE_JOB_NAME)
    }

    /// Build a job materializing the selected assets
    pub fn build_job(&self, name: &str, selection: Option<Selection>) -> Result<JobDefinition> {
        if Self::is_base_job_name(name) {
            return Err(Error::InvalidDefinition(format!(
                "Attempted to build job called {}, which is a reserved name.",
                name
            ))
            .into());
        }
        let selected = self.resolve_selection(selection.as_ref())?;
        debug!(
            job = name,
            selection = %selection.as_ref().map(ToString::to_string).unwrap_or_else(|| "*".into()),
            selected = ?selected,
            "Resolved job selection"
        );
        self.build_job_for_keys(name, &selected)
    }

    fn build_job_for_keys(&self, name: &str, selected: &BTreeSet<AssetKey>) -> Result<JobDefinition> {
        let mut included = Vec::new();
        for asset in &self.assets {
            let asset_keys = asset.asset_keys();
            let selected_here: BTreeSet<AssetKey> =
                asset_keys.intersection(selected).cloned().collect();

            if selected_here.is_empty() {
                continue;
            }
            if &selected_here == asset_keys {
                included.push(asset.clone());
            } else if asset.can_subset() {
                included.push(asset.subset_for(&selected_here));
            } else {
                return Err(Error::InvalidDefinition(format!(
                    "When building job, the AssetsDefinition '{}' contains asset keys {}, but attempted to select only {}. This AssetsDefinition does not support subsetting. Please select all asset keys produced by this asset.",
                    asset.node_name(),
                    format_keys(asset_keys),
                    format_keys(&selected_here)
                ))
                .into());
            }
        }

        let resource_defs = self.job_resource_defs(&included)?;
        JobDefinition::assemble(JobAssembly {
            name: name.to_string(),
            included,
            context_assets: &self.assets,
            source_assets: &self.source_assets,
            resource_defs,
            executor: self.executor,
        })
    }

    /// Group resources plus the asset-scoped resources of `included`
    fn job_resource_defs(
        &self,
        included: &[AssetsDefinition],
    ) -> Result<BTreeMap<String, ResourceDefinition>> {
        let mut merged = self.resource_defs.clone();
        for asset in included {
            for (key, resource) in asset.resource_defs() {
                match merged.get(key) {
                    Some(existing) if !existing.same_as(resource) => {
                        return Err(Error::InvalidDefinition(format!(
                            "AssetsDefinition '{}' had a conflicting version of the same resource key {}. Please resolve this conflict by giving different keys to each resource definition.",
                            asset.node_name(),
                            key
                        ))
                        .into());
                    }
                    Some(_) => {}
                    None => {
                        merged.insert(key.clone(), resource.clone());
                    }
                }
            }
        }
        Ok(merged)
    }

    /// Build and run a job for the selection in the current process
    pub fn materialize(&self, selection: Option<Selection>) -> Result<ExecutionResult> {
        if let Some(executor) = &self.executor {
            if !executor.is_in_process() {
                return Err(Error::UnmetExecutorRequirements(format!(
                    "'materialize' can only be invoked on AssetGroups which have no executor or have the in_process_executor, but the AssetGroup had executor '{}'",
                    executor.name()
                ))
                .into());
            }
        }

        let job = self.build_job(EPHEMERAL_JOB_NAME, selection)?;
        info!(assets = job.asset_keys().len(), "Materializing assets");
        job.execute_in_process()
    }

    /// Jobs a repository exposes for this group
    ///
    /// One job named [`BASE_JOB_NAME`] when the group uses at most one
    /// partitions definition, otherwise one job per partitions definition
    /// (`__ASSET_GROUP_<i>`) that also contains every unpartitioned asset.
    pub fn base_jobs(&self) -> Result<Vec<JobDefinition>> {
        let mut partitions_defs: Vec<&PartitionsDefinition> = Vec::new();
        for asset in &self.assets {
            if let Some(partitions_def) = asset.partitions_def() {
                if !partitions_defs.contains(&partitions_def) {
                    partitions_defs.push(partitions_def);
                }
            }
        }

        let all_keys = self.asset_graph().produced_keys();
        if partitions_defs.len() <= 1 {
            return Ok(vec![self.build_job_for_keys(BASE_JOB_NAME, &all_keys)?]);
        }

        partitions_defs
            .iter()
            .enumerate()
            .map(|(idx, partitions_def)| {
                let keys: BTreeSet<AssetKey> = self
                    .assets
                    .iter()
                    .filter(|asset| {
                        asset
                            .partitions_def()
                            .map_or(true, |p| p == *partitions_def)
                    })
                    .flat_map(|asset| asset.asset_keys().iter().cloned())
                    .collect();
                self.build_job_for_keys(&format!("{}_{}", BASE_JOB_NAME, idx), &keys)
            })
            .collect()
    }

    /// Prepend `prefix` to every produced key
    ///
    /// Dependencies on keys produced inside the group are rewritten; source
    /// assets and dependencies pointing outside the group keep their keys.
    pub fn prefixed(&self, prefix: &str) -> Self {
        let group_keys: HashSet<AssetKey> = self
            .assets
            .iter()
            .flat_map(|asset| asset.all_asset_keys())
            .collect();

        Self {
            assets: self
                .assets
                .iter()
                .map(|asset| asset.with_prefix(prefix, &group_keys))
                .collect(),
            source_assets: self.source_assets.clone(),
            resource_defs: self.resource_defs.clone(),
            executor: self.executor,
        }
    }

    /// Combine two groups that share identical resources and executor
    pub fn merge(&self, other: &AssetGroup) -> Result<AssetGroup> {
        if self.resource_defs != other.resource_defs {
            return Err(Error::InvalidDefinition(format!(
                "Can't add asset groups together with different resource definition mappings. Resource keys {} and {}",
                format_names(self.resource_defs.keys().map(String::as_str)),
                format_names(other.resource_defs.keys().map(String::as_str))
            ))
            .into());
        }
        if self.executor != other.executor {
            return Err(Error::InvalidDefinition(
                "Can't add asset groups together with different executors".to_string(),
            )
            .into());
        }

        Self::new(
            self.assets.iter().chain(&other.assets).cloned().collect(),
            self.source_assets
                .iter()
                .chain(&other.source_assets)
                .cloned()
                .collect(),
            self.resource_defs.clone(),
            self.executor,
        )
    }

    /// One source asset per produced key, so other groups can depend on them
    pub fn to_source_assets(&self) -> Vec<SourceAsset> {
        self.assets
            .iter()
            .flat_map(|asset| {
                asset.selected_outputs().map(move |out| {
                    let source = SourceAsset::new(out.asset_key.clone())
                        .with_io_manager_key(out.io_manager_key.clone());
                    match asset.partitions_def() {
                        Some(partitions_def) => source.with_partitions_def(partitions_def.clone()),
                        None => source,
                    }
                })
            })
            .collect()
    }
}

impl PartialEq for AssetGroup {
    fn eq(&self, other: &Self) -> bool {
        self.assets == other.assets
            && self.source_assets == other.source_assets
            && self.resource_defs == other.resource_defs
            && self.executor == other.executor
    }
}

impl Add for AssetGroup {
    type Output = Result<AssetGroup>;

    fn add(self, other: AssetGroup) -> Self::Output {
        self.merge(&other)
    }
}

/// Fluent construction of an [`AssetGroup`]
#[derive(Debug, Default)]
pub struct AssetGroupBuilder {
    assets: Vec<AssetsDefinition>,
    source_assets: Vec<SourceAsset>,
    resource_defs: BTreeMap<String, ResourceDefinition>,
    executor: Option<ExecutorDefinition>,
}

impl AssetGroupBuilder {
    pub fn asset(mut self, asset: AssetsDefinition) -> Self {
        self.assets.push(asset);
        self
    }

    pub fn assets(mut self, assets: impl IntoIterator<Item = AssetsDefinition>) -> Self {
        self.assets.extend(assets);
        self
    }

    pub fn source_asset(mut self, source: SourceAsset) -> Self {
        self.source_assets.push(source);
        self
    }

    pub fn resource(mut self, key: impl Into<String>, resource: ResourceDefinition) -> Self {
        self.resource_defs.insert(key.into(), resource);
        self
    }

    pub fn executor(mut self, executor: ExecutorDefinition) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> Result<AssetGroup> {
        AssetGroup::new(
            self.assets,
            self.source_assets,
            self.resource_defs,
            self.executor,
        )
    }
}
