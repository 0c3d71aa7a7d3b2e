//! Graph-backed assets
//!
//! A graph-backed asset is a single asset computed by an ordered chain of
//! ops. The first op receives `None`; every later op receives the value the
//! previous op returned. The asset's value is the value of the last op. Ops
//! read the asset's inputs and resources through the shared
//! [`ComputeContext`].

use crate::asset::{AssetBuilder, AssetIn, AssetsDefinition, ComputeContext};
use crate::partition::PartitionsDefinition;
use crate::resource::ResourceDefinition;
use crate::{Error, Result, Value};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Compute function of an op: the context and the previous op's value
pub type OpFn = Arc<dyn Fn(&ComputeContext, Option<Value>) -> Result<Value> + Send + Sync>;

/// One step of a graph-backed asset
#[derive(Clone)]
pub struct OpDefinition {
    name: String,
    required_resource_keys: BTreeSet<String>,
    compute: OpFn,
}

impl OpDefinition {
    pub fn new<F>(name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&ComputeContext, Option<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            required_resource_keys: BTreeSet::new(),
            compute: Arc::new(compute),
        }
    }

    pub fn required_resource_key(mut self, key: impl Into<String>) -> Self {
        self.required_resource_keys.insert(key.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required_resource_keys(&self) -> &BTreeSet<String> {
        &self.required_resource_keys
    }
}

impl fmt::Debug for OpDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpDefinition")
            .field("name", &self.name)
            .field("required_resource_keys", &self.required_resource_keys)
            .finish()
    }
}

/// Builder for graph-backed assets
///
/// The resulting definition behaves like a single asset: one node named after
/// the key path, one default output, and the union of its ops' required
/// resource keys.
pub struct GraphAssetBuilder {
    asset: AssetBuilder,
    name: String,
    ops: Vec<OpDefinition>,
}

impl GraphAssetBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            asset: AssetBuilder::new(name.clone()),
            name,
            ops: Vec::new(),
        }
    }

    pub fn namespace<I, S>(mut self, namespace: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.asset = self.asset.namespace(namespace);
        self
    }

    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.asset = self.asset.input(name);
        self
    }

    pub fn input_with(mut self, input: AssetIn) -> Self {
        self.asset = self.asset.input_with(input);
        self
    }

    /// Append a step to the chain
    pub fn op(mut self, op: OpDefinition) -> Self {
        self.ops.push(op);
        self
    }

    pub fn io_manager_key(mut self, key: impl Into<String>) -> Self {
        self.asset = self.asset.io_manager_key(key);
        self
    }

    pub fn resource_def(mut self, key: impl Into<String>, resource: ResourceDefinition) -> Self {
        self.asset = self.asset.resource_def(key, resource);
        self
    }

    pub fn partitions_def(mut self, partitions_def: PartitionsDefinition) -> Self {
        self.asset = self.asset.partitions_def(partitions_def);
        self
    }

    /// Validate the op chain and build the definition
    pub fn build(self) -> Result<AssetsDefinition> {
        if self.ops.is_empty() {
            return Err(Error::InvalidDefinition(format!(
                "Graph-backed asset '{}' must contain at least one op",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for op in &self.ops {
            if !seen.insert(op.name.as_str()) {
                return Err(Error::InvalidDefinition(format!(
                    "Graph-backed asset '{}' contains more than one op named '{}'",
                    self.name, op.name
                )));
            }
        }

        let mut asset = self.asset;
        for key in self.ops.iter().flat_map(|op| op.required_resource_keys.iter()) {
            asset = asset.required_resource_key(key.clone());
        }

        let ops = self.ops;
        Ok(asset
            .compute(move |ctx| {
                let mut value = None;
                for op in &ops {
                    let output = (op.compute)(ctx, value.take()).map_err(|err| {
                        Error::Execution(format!(
                            "Op '{}' of '{}' failed: {}",
                            op.name,
                            ctx.node_name(),
                            err
                        ))
                    })?;
                    debug!(node = ctx.node_name(), op = %op.name, "Op finished");
                    value = Some(output);
                }
                Ok(value.unwrap_or(Value::Null))
            })
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::AssetKey;
    use crate::DEFAULT_OUTPUT_NAME;
    use serde_json::json;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn add(amount: i64) -> OpDefinition {
        OpDefinition::new(format!("add_{}", amount), move |_, previous| {
            let base = previous.and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(json!(base + amount))
        })
    }

    #[test]
    fn test_ops_run_in_order() {
        let asset = AssetsDefinition::graph_asset("cool_thing")
            .op(add(1))
            .op(add(2))
            .op(OpDefinition::new("double", |_, previous| {
                Ok(json!(previous.and_then(|v| v.as_i64()).unwrap_or(0) * 2))
            }))
            .build()
            .unwrap();

        let ctx = ComputeContext::new(
            Uuid::new_v4(),
            asset.node_name(),
            HashMap::new(),
            HashMap::new(),
            vec![DEFAULT_OUTPUT_NAME.to_string()],
            None,
        );
        assert_eq!(asset.node_name(), "cool_thing");
        assert_eq!(asset.asset_key(), Some(&AssetKey::from("cool_thing")));
        assert_eq!(asset.compute(&ctx).unwrap()[0].value, json!(6));
    }

    #[test]
    fn test_required_resource_keys_are_collected() {
        let asset = AssetsDefinition::graph_asset("basic")
            .namespace(["ns"])
            .op(add(1).required_resource_key("foo"))
            .op(add(2).required_resource_key("bar"))
            .build()
            .unwrap();
        assert_eq!(asset.node_name(), "ns__basic");
        assert_eq!(
            asset.required_resource_keys(),
            &BTreeSet::from(["bar".to_string(), "foo".to_string()])
        );
    }

    #[test]
    fn test_invalid_chains_are_rejected() {
        let err = AssetsDefinition::graph_asset("empty").build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Graph-backed asset 'empty' must contain at least one op"
        );

        let err = AssetsDefinition::graph_asset("twice")
            .op(add(1))
            .op(add(1))
            .build()
            .unwrap_err();
        assert!(err.is_invalid_definition());
        assert!(err.to_string().contains("more than one op named 'add_1'"));
    }

    #[test]
    fn test_op_failure_names_the_op() {
        let asset = AssetsDefinition::graph_asset("broken")
            .op(add(1))
            .op(OpDefinition::new("explode", |_, _| {
                Err(Error::Execution("boom".into()))
            }))
            .build()
            .unwrap();
        let ctx = ComputeContext::new(
            Uuid::new_v4(),
            "broken",
            HashMap::new(),
            HashMap::new(),
            vec![DEFAULT_OUTPUT_NAME.to_string()],
            None,
        );
        let err = asset.compute(&ctx).unwrap_err();
        assert!(err.to_string().contains("Op 'explode' of 'broken' failed"));
    }
}
