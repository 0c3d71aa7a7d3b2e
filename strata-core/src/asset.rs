//! Asset definitions
//!
//! An [`AssetsDefinition`] is a named computation producing one or more
//! assets. Inputs are declared explicitly and resolve to the asset keys the
//! computation depends on. Assets produced elsewhere are declared as
//! [`SourceAsset`]s.

use crate::key::AssetKey;
use crate::op::GraphAssetBuilder;
use crate::partition::PartitionsDefinition;
use crate::resource::{ResourceDefinition, DEFAULT_IO_MANAGER_KEY};
use crate::{Error, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Output name of single-asset definitions
pub const DEFAULT_OUTPUT_NAME: &str = "result";

/// Compute function of an asset definition
pub type ComputeFn = Arc<dyn Fn(&ComputeContext) -> Result<Vec<Output>> + Send + Sync>;

/// A value returned by a compute function for one of its outputs
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub name: String,
    pub value: Value,
}

impl Output {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Everything a compute function can see while running
#[derive(Debug, Clone)]
pub struct ComputeContext {
    run_id: Uuid,
    node_name: String,
    inputs: HashMap<String, Value>,
    resources: HashMap<String, Value>,
    selected_output_names: Vec<String>,
    partition_key: Option<String>,
}

impl ComputeContext {
    pub fn new(
        run_id: Uuid,
        node_name: impl Into<String>,
        inputs: HashMap<String, Value>,
        resources: HashMap<String, Value>,
        selected_output_names: Vec<String>,
        partition_key: Option<String>,
    ) -> Self {
        Self {
            run_id,
            node_name: node_name.into(),
            inputs,
            resources,
            selected_output_names,
            partition_key,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Value loaded for a declared input
    pub fn input(&self, name: &str) -> Result<&Value> {
        self.inputs.get(name).ok_or_else(|| {
            Error::Execution(format!(
                "Node '{}' has no input named '{}'",
                self.node_name, name
            ))
        })
    }

    /// Value of a required resource
    pub fn resource(&self, key: &str) -> Result<&Value> {
        self.resources.get(key).ok_or_else(|| {
            Error::Execution(format!(
                "Node '{}' did not require resource '{}'",
                self.node_name, key
            ))
        })
    }

    /// Outputs the current job expects this node to produce
    pub fn selected_output_names(&self) -> &[String] {
        &self.selected_output_names
    }

    pub fn is_output_selected(&self, name: &str) -> bool {
        self.selected_output_names.iter().any(|n| n == name)
    }

    pub fn partition_key(&self) -> Option<&str> {
        self.partition_key.as_deref()
    }
}

/// Input declaration
///
/// The asset key an input depends on is, in order of precedence: the
/// explicit `key`, `namespace` + input name, or the input name alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetIn {
    pub name: String,
    pub key: Option<AssetKey>,
    pub namespace: Option<Vec<String>>,
}

impl AssetIn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            namespace: None,
        }
    }

    /// Depend on an explicit asset key
    pub fn key(mut self, key: impl Into<AssetKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Depend on the same-named asset inside `namespace`
    pub fn namespace<I, S>(mut self, namespace: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespace = Some(namespace.into_iter().map(Into::into).collect());
        self
    }

    fn resolve(self) -> AssetInput {
        let key = match (self.key, self.namespace) {
            (Some(key), _) => key,
            (None, Some(mut namespace)) => {
                namespace.push(self.name.clone());
                AssetKey::from(namespace)
            }
            (None, None) => AssetKey::from(self.name.as_str()),
        };
        AssetInput {
            name: self.name,
            asset_key: key,
        }
    }
}

/// Resolved input: input name and the asset key it loads
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetInput {
    pub name: String,
    pub asset_key: AssetKey,
}

/// Output declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOut {
    pub name: String,
    pub asset_key: AssetKey,
    pub io_manager_key: String,
    pub is_required: bool,
}

impl AssetOut {
    /// An output whose asset key is its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            asset_key: AssetKey::from(name.as_str()),
            name,
            io_manager_key: DEFAULT_IO_MANAGER_KEY.to_string(),
            is_required: true,
        }
    }

    pub fn asset_key(mut self, key: impl Into<AssetKey>) -> Self {
        self.asset_key = key.into();
        self
    }

    pub fn io_manager_key(mut self, key: impl Into<String>) -> Self {
        self.io_manager_key = key.into();
        self
    }

    /// Allow the compute function to skip this output
    pub fn optional(mut self) -> Self {
        self.is_required = false;
        self
    }
}

/// A computation producing one or more assets
#[derive(Clone)]
pub struct AssetsDefinition {
    node_name: String,
    inputs: Vec<AssetInput>,
    outputs: Vec<AssetOut>,
    internal_deps: BTreeMap<AssetKey, BTreeSet<AssetKey>>,
    can_subset: bool,
    selected_keys: BTreeSet<AssetKey>,
    required_resource_keys: BTreeSet<String>,
    resource_defs: BTreeMap<String, ResourceDefinition>,
    partitions_def: Option<PartitionsDefinition>,
    compute: ComputeFn,
}

impl AssetsDefinition {
    /// Start declaring a single-output asset named `name`
    pub fn asset(name: impl Into<String>) -> AssetBuilder {
        AssetBuilder::new(name)
    }

    /// Start declaring a definition with several outputs
    pub fn multi_asset(name: impl Into<String>) -> MultiAssetBuilder {
        MultiAssetBuilder::new(name)
    }

    /// Start declaring a single asset computed by a chain of ops
    pub fn graph_asset(name: impl Into<String>) -> GraphAssetBuilder {
        GraphAssetBuilder::new(name)
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Keys this definition currently produces (the selected subset)
    pub fn asset_keys(&self) -> &BTreeSet<AssetKey> {
        &self.selected_keys
    }

    /// Keys of every declared output, selected or not
    pub fn all_asset_keys(&self) -> BTreeSet<AssetKey> {
        self.outputs.iter().map(|o| o.asset_key.clone()).collect()
    }

    /// Key of the first selected output
    pub fn asset_key(&self) -> Option<&AssetKey> {
        self.selected_keys.iter().next()
    }

    pub fn inputs(&self) -> &[AssetInput] {
        &self.inputs
    }

    /// Declared outputs, in declaration order
    pub fn outputs(&self) -> &[AssetOut] {
        &self.outputs
    }

    /// Outputs whose keys are currently selected, in declaration order
    pub fn selected_outputs(&self) -> impl Iterator<Item = &AssetOut> {
        self.outputs
            .iter()
            .filter(|o| self.selected_keys.contains(&o.asset_key))
    }

    pub fn output_for_key(&self, key: &AssetKey) -> Option<&AssetOut> {
        self.outputs.iter().find(|o| &o.asset_key == key)
    }

    pub fn output_named(&self, name: &str) -> Option<&AssetOut> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Keys of every input
    pub fn dependency_keys(&self) -> BTreeSet<AssetKey> {
        self.inputs.iter().map(|i| i.asset_key.clone()).collect()
    }

    /// Keys a specific output depends on
    ///
    /// Without internal dependencies every output depends on every input.
    pub fn deps_for(&self, key: &AssetKey) -> BTreeSet<AssetKey> {
        match self.internal_deps.get(key) {
            Some(deps) => deps.clone(),
            None => self.dependency_keys(),
        }
    }

    pub fn can_subset(&self) -> bool {
        self.can_subset
    }

    pub fn required_resource_keys(&self) -> &BTreeSet<String> {
        &self.required_resource_keys
    }

    /// Resources bound on the asset itself
    pub fn resource_defs(&self) -> &BTreeMap<String, ResourceDefinition> {
        &self.resource_defs
    }

    pub fn partitions_def(&self) -> Option<&PartitionsDefinition> {
        self.partitions_def.as_ref()
    }

    /// Run the compute function
    pub fn compute(&self, context: &ComputeContext) -> Result<Vec<Output>> {
        (self.compute)(context)
    }

    /// Restrict this definition to the outputs whose keys are in `selected`
    pub fn subset_for(&self, selected: &BTreeSet<AssetKey>) -> AssetsDefinition {
        let mut subset = self.clone();
        subset.selected_keys = self
            .selected_keys
            .intersection(selected)
            .cloned()
            .collect();
        subset
    }

    /// Prefix produced keys, and dependencies on keys listed in `group_keys`
    pub fn with_prefix(&self, prefix: &str, group_keys: &HashSet<AssetKey>) -> AssetsDefinition {
        let rewrite = |key: &AssetKey| {
            if group_keys.contains(key) {
                key.with_prefix(prefix)
            } else {
                key.clone()
            }
        };

        let mut prefixed = self.clone();
        prefixed.outputs = self
            .outputs
            .iter()
            .map(|o| AssetOut {
                asset_key: o.asset_key.with_prefix(prefix),
                ..o.clone()
            })
            .collect();
        prefixed.inputs = self
            .inputs
            .iter()
            .map(|i| AssetInput {
                name: i.name.clone(),
                asset_key: rewrite(&i.asset_key),
            })
            .collect();
        prefixed.internal_deps = self
            .internal_deps
            .iter()
            .map(|(out, deps)| (out.with_prefix(prefix), deps.iter().map(rewrite).collect()))
            .collect();
        prefixed.selected_keys = self
            .selected_keys
            .iter()
            .map(|k| k.with_prefix(prefix))
            .collect();
        prefixed
    }

    fn shares_compute(&self, other: &AssetsDefinition) -> bool {
        Arc::ptr_eq(&self.compute, &other.compute)
    }
}

impl PartialEq for AssetsDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.node_name == other.node_name
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.internal_deps == other.internal_deps
            && self.can_subset == other.can_subset
            && self.selected_keys == other.selected_keys
            && self.required_resource_keys == other.required_resource_keys
            && self.resource_defs == other.resource_defs
            && self.partitions_def == other.partitions_def
            && self.shares_compute(other)
    }
}

impl fmt::Debug for AssetsDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetsDefinition")
            .field("node_name", &self.node_name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("can_subset", &self.can_subset)
            .field("selected_keys", &self.selected_keys)
            .field("required_resource_keys", &self.required_resource_keys)
            .field("partitions_def", &self.partitions_def)
            .finish()
    }
}

/// Builder for single-output assets
pub struct AssetBuilder {
    name: String,
    namespace: Vec<String>,
    inputs: Vec<AssetIn>,
    io_manager_key: String,
    required_resource_keys: BTreeSet<String>,
    resource_defs: BTreeMap<String, ResourceDefinition>,
    partitions_def: Option<PartitionsDefinition>,
    compute: Option<ComputeFn>,
}

impl AssetBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Vec::new(),
            inputs: Vec::new(),
            io_manager_key: DEFAULT_IO_MANAGER_KEY.to_string(),
            required_resource_keys: BTreeSet::new(),
            resource_defs: BTreeMap::new(),
            partitions_def: None,
            compute: None,
        }
    }

    /// Place the asset's key under `namespace`
    pub fn namespace<I, S>(mut self, namespace: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespace = namespace.into_iter().map(Into::into).collect();
        self
    }

    /// Depend on the asset named like the input
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(AssetIn::new(name));
        self
    }

    /// Depend on an asset through a fully specified input
    pub fn input_with(mut self, input: AssetIn) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn io_manager_key(mut self, key: impl Into<String>) -> Self {
        self.io_manager_key = key.into();
        self
    }

    pub fn required_resource_key(mut self, key: impl Into<String>) -> Self {
        self.required_resource_keys.insert(key.into());
        self
    }

    /// Bind a resource on the asset itself
    pub fn resource_def(mut self, key: impl Into<String>, resource: ResourceDefinition) -> Self {
        self.resource_defs.insert(key.into(), resource);
        self
    }

    pub fn partitions_def(mut self, partitions_def: PartitionsDefinition) -> Self {
        self.partitions_def = Some(partitions_def);
        self
    }

    /// Set the computation producing the asset's value
    pub fn compute<F>(mut self, compute: F) -> Self
    where
        F: Fn(&ComputeContext) -> Result<Value> + Send + Sync + 'static,
    {
        self.compute = Some(Arc::new(move |ctx: &ComputeContext| {
            Ok(vec![Output::new(DEFAULT_OUTPUT_NAME, compute(ctx)?)])
        }));
        self
    }

    /// Build the definition; the node is named after the key path joined by `__`
    pub fn build(self) -> AssetsDefinition {
        let mut path = self.namespace;
        path.push(self.name);
        let node_name = path.join("__");
        let key = AssetKey::from(path);

        AssetsDefinition {
            node_name,
            inputs: self.inputs.into_iter().map(AssetIn::resolve).collect(),
            outputs: vec![AssetOut {
                name: DEFAULT_OUTPUT_NAME.to_string(),
                asset_key: key.clone(),
                io_manager_key: self.io_manager_key,
                is_required: true,
            }],
            internal_deps: BTreeMap::new(),
            can_subset: false,
            selected_keys: BTreeSet::from([key]),
            required_resource_keys: self.required_resource_keys,
            resource_defs: self.resource_defs,
            partitions_def: self.partitions_def,
            compute: self.compute.unwrap_or_else(|| {
                Arc::new(|_: &ComputeContext| Ok(vec![Output::new(DEFAULT_OUTPUT_NAME, Value::Null)]))
            }),
        }
    }
}

/// Builder for definitions producing several assets
pub struct MultiAssetBuilder {
    name: String,
    inputs: Vec<AssetIn>,
    outputs: Vec<AssetOut>,
    internal_deps: Vec<(String, Vec<AssetKey>)>,
    can_subset: bool,
    required_resource_keys: BTreeSet<String>,
    resource_defs: BTreeMap<String, ResourceDefinition>,
    partitions_def: Option<PartitionsDefinition>,
    compute: Option<ComputeFn>,
}

impl MultiAssetBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            internal_deps: Vec::new(),
            can_subset: false,
            required_resource_keys: BTreeSet::new(),
            resource_defs: BTreeMap::new(),
            partitions_def: None,
            compute: None,
        }
    }

    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(AssetIn::new(name));
        self
    }

    pub fn input_with(mut self, input: AssetIn) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn out(mut self, out: AssetOut) -> Self {
        self.outputs.push(out);
        self
    }

    /// Declare which keys a single output depends on
    pub fn internal_deps<I, K>(mut self, output_name: impl Into<String>, deps: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<AssetKey>,
    {
        self.internal_deps
            .push((output_name.into(), deps.into_iter().map(Into::into).collect()));
        self
    }

    /// Whether a job may select only some of the outputs
    pub fn can_subset(mut self, can_subset: bool) -> Self {
        self.can_subset = can_subset;
        self
    }

    pub fn required_resource_key(mut self, key: impl Into<String>) -> Self {
        self.required_resource_keys.insert(key.into());
        self
    }

    pub fn resource_def(mut self, key: impl Into<String>, resource: ResourceDefinition) -> Self {
        self.resource_defs.insert(key.into(), resource);
        self
    }

    pub fn partitions_def(mut self, partitions_def: PartitionsDefinition) -> Self {
        self.partitions_def = Some(partitions_def);
        self
    }

    pub fn compute<F>(mut self, compute: F) -> Self
    where
        F: Fn(&ComputeContext) -> Result<Vec<Output>> + Send + Sync + 'static,
    {
        self.compute = Some(Arc::new(compute));
        self
    }

    /// Validate the declaration and build the definition
    pub fn build(self) -> Result<AssetsDefinition> {
        if self.outputs.is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "Multi asset '{}' must declare at least one output",
                self.name
            )));
        }

        let mut seen_names = HashSet::new();
        let mut seen_keys = HashSet::new();
        for out in &self.outputs {
            if !seen_names.insert(out.name.as_str()) {
                return Err(Error::InvalidDefinition(format!(
                    "Multi asset '{}' declares output '{}' more than once",
                    self.name, out.name
                )));
            }
            if !seen_keys.insert(&out.asset_key) {
                return Err(Error::InvalidDefinition(format!(
                    "Multi asset '{}' declares {} more than once",
                    self.name, out.asset_key
                )));
            }
        }

        let inputs: Vec<AssetInput> = self.inputs.into_iter().map(AssetIn::resolve).collect();
        let known_keys: HashSet<&AssetKey> = inputs
            .iter()
            .map(|i| &i.asset_key)
            .chain(self.outputs.iter().map(|o| &o.asset_key))
            .collect();

        let mut internal_deps = BTreeMap::new();
        for (output_name, deps) in self.internal_deps {
            let out = self
                .outputs
                .iter()
                .find(|o| o.name == output_name)
                .ok_or_else(|| {
                    Error::InvalidDefinition(format!(
                        "Multi asset '{}' declares internal dependencies for unknown output '{}'",
                        self.name, output_name
                    ))
                })?;
            if let Some(unknown) = deps.iter().find(|dep| !known_keys.contains(dep)) {
                return Err(Error::InvalidDefinition(format!(
                    "Multi asset '{}' declares that output '{}' depends on {}, which is neither an input nor an output",
                    self.name, output_name, unknown
                )));
            }
            internal_deps.insert(out.asset_key.clone(), deps.into_iter().collect());
        }

        let selected_keys = self.outputs.iter().map(|o| o.asset_key.clone()).collect();
        let name = self.name.clone();

        Ok(AssetsDefinition {
            node_name: self.name,
            inputs,
            outputs: self.outputs,
            internal_deps,
            can_subset: self.can_subset,
            selected_keys,
            required_resource_keys: self.required_resource_keys,
            resource_defs: self.resource_defs,
            partitions_def: self.partitions_def,
            compute: self.compute.unwrap_or_else(|| {
                Arc::new(move |_: &ComputeContext| {
                    Err(Error::Execution(format!(
                        "Multi asset '{}' has no compute function",
                        name
                    )))
                })
            }),
        })
    }
}

/// An asset produced outside the group that declares it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAsset {
    pub key: AssetKey,
    pub io_manager_key: String,
    pub description: Option<String>,
    pub partitions_def: Option<PartitionsDefinition>,
}

impl SourceAsset {
    pub fn new(key: impl Into<AssetKey>) -> Self {
        Self {
            key: key.into(),
            io_manager_key: DEFAULT_IO_MANAGER_KEY.to_string(),
            description: None,
            partitions_def: None,
        }
    }

    pub fn with_io_manager_key(mut self, key: impl Into<String>) -> Self {
        self.io_manager_key = key.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_partitions_def(mut self, partitions_def: PartitionsDefinition) -> Self {
        self.partitions_def = Some(partitions_def);
        self
    }
}
