//! Asset graph and IO manager fixtures
//!
//! The diamond graph used across the suites:
//!
//! ```text
//! start -> a ----------> d -> f
//!          |      b --^  |    ^
//!          |      |      v    |
//!          |      c -> e -----+
//!          +-----------> final <- d
//! ```
//!
//! Materialized from scratch it yields `start=1, a=2, b=1, c=2, d=3, e=3,
//! f=6, final=5`, whether built from single assets or from the `abc_` and
//! `def_` multi assets.

use serde_json::json;
use std::sync::Arc;
use strata_core::{
    AssetOut, AssetsDefinition, ComputeContext, Error, InMemoryIoManager, InputContext, IoManager,
    Output, OutputContext, ResourceDefinition, Value, DEFAULT_IO_MANAGER_KEY, DEFAULT_OUTPUT_NAME,
};
use strata_runtime::AssetGroup;

/// Expected value of every diamond asset after a full materialization
pub const DIAMOND_VALUES: [(&str, i64); 8] = [
    ("start", 1),
    ("a", 2),
    ("b", 1),
    ("c", 2),
    ("d", 3),
    ("e", 3),
    ("f", 6),
    ("final", 5),
];

/// In-memory IO manager keyed by asset key, plus the resource wrapping it
///
/// Keep the handle to inspect what runs stored.
pub fn asset_aware_io_manager() -> (Arc<InMemoryIoManager>, ResourceDefinition) {
    let store = Arc::new(InMemoryIoManager::new());
    let resource = ResourceDefinition::from_io_manager(
        "asset_aware_io_manager",
        store.clone() as Arc<dyn IoManager>,
    );
    (store, resource)
}

/// Loads the same value for every input and discards outputs
#[derive(Debug, Clone)]
pub struct ConstantIoManager(pub Value);

impl IoManager for ConstantIoManager {
    fn handle_output(&self, _context: &OutputContext, _value: &Value) -> strata_core::Result<()> {
        Ok(())
    }

    fn load_input(&self, _context: &InputContext) -> strata_core::Result<Value> {
        Ok(self.0.clone())
    }
}

impl ConstantIoManager {
    pub fn resource(value: Value) -> ResourceDefinition {
        ResourceDefinition::io_manager("constant_io_manager", Self(value))
    }
}

fn int_input(ctx: &ComputeContext, name: &str) -> strata_core::Result<i64> {
    ctx.input(name)?.as_i64().ok_or_else(|| {
        Error::Execution(format!(
            "Input '{}' of '{}' is not an integer",
            name,
            ctx.node_name()
        ))
    })
}

/// Yield the selected outputs, or all of them when subsetting is off
fn yield_outputs(
    ctx: &ComputeContext,
    allow_subset: bool,
    values: [(&str, i64); 3],
) -> Vec<Output> {
    values
        .into_iter()
        .filter(|(name, _)| !allow_subset || ctx.is_output_selected(name))
        .map(|(name, value)| Output::new(name, json!(value)))
        .collect()
}

/// The diamond graph's definitions
///
/// With `use_multi`, `a`, `b` and `c` come from the `abc_` multi asset and
/// `d`, `e` and `f` from `def_`; `allow_subset` controls whether those two
/// may be subset.
pub fn diamond_assets(use_multi: bool, allow_subset: bool) -> Vec<AssetsDefinition> {
    let start = AssetsDefinition::asset("start")
        .compute(|_| Ok(json!(1)))
        .build();
    let final_ = AssetsDefinition::asset("final")
        .input("a")
        .input("d")
        .compute(|ctx| Ok(json!(int_input(ctx, "a")? + int_input(ctx, "d")?)))
        .build();

    if !use_multi {
        return vec![
            start,
            AssetsDefinition::asset("a")
                .input("start")
                .compute(|ctx| Ok(json!(int_input(ctx, "start")? + 1)))
                .build(),
            AssetsDefinition::asset("b").compute(|_| Ok(json!(1))).build(),
            AssetsDefinition::asset("c")
                .input("b")
                .compute(|ctx| Ok(json!(int_input(ctx, "b")? + 1)))
                .build(),
            AssetsDefinition::asset("d")
                .input("a")
                .input("b")
                .compute(|ctx| Ok(json!(int_input(ctx, "a")? + int_input(ctx, "b")?)))
                .build(),
            AssetsDefinition::asset("e")
                .input("c")
                .compute(|ctx| Ok(json!(int_input(ctx, "c")? + 1)))
                .build(),
            AssetsDefinition::asset("f")
                .input("d")
                .input("e")
                .compute(|ctx| Ok(json!(int_input(ctx, "d")? + int_input(ctx, "e")?)))
                .build(),
            final_,
        ];
    }

    let abc = AssetsDefinition::multi_asset("abc_")
        .input("start")
        .out(AssetOut::new("a").optional())
        .out(AssetOut::new("b").optional())
        .out(AssetOut::new("c").optional())
        .internal_deps("a", ["start"])
        .internal_deps("b", Vec::<&str>::new())
        .internal_deps("c", ["b"])
        .can_subset(allow_subset)
        .compute(move |ctx| {
            let a = int_input(ctx, "start")? + 1;
            let b = 1;
            Ok(yield_outputs(ctx, allow_subset, [("a", a), ("b", b), ("c", b + 1)]))
        })
        .build()
        .expect("abc_ declaration is valid");

    let def = AssetsDefinition::multi_asset("def_")
        .input("a")
        .input("b")
        .input("c")
        .out(AssetOut::new("d").optional())
        .out(AssetOut::new("e").optional())
        .out(AssetOut::new("f").optional())
        .internal_deps("d", ["a", "b"])
        .internal_deps("e", ["c"])
        .internal_deps("f", ["d", "e"])
        .can_subset(allow_subset)
        .compute(move |ctx| {
            let d = int_input(ctx, "a")? + int_input(ctx, "b")?;
            let e = int_input(ctx, "c")? + 1;
            Ok(yield_outputs(ctx, allow_subset, [("d", d), ("e", e), ("f", d + e)]))
        })
        .build()
        .expect("def_ declaration is valid");

    vec![start, abc, def, final_]
}

/// The diamond graph bound to `io_manager`
pub fn diamond_group(
    use_multi: bool,
    allow_subset: bool,
    io_manager: ResourceDefinition,
) -> AssetGroup {
    AssetGroup::builder()
        .assets(diamond_assets(use_multi, allow_subset))
        .resource(DEFAULT_IO_MANAGER_KEY, io_manager)
        .build()
        .expect("diamond group is valid")
}

/// Node and output a diamond asset is produced by
pub fn diamond_output(use_multi: bool, asset: &str) -> (String, String) {
    match (use_multi, asset) {
        (true, "a" | "b" | "c") => ("abc_".to_string(), asset.to_string()),
        (true, "d" | "e" | "f") => ("def_".to_string(), asset.to_string()),
        _ => (asset.to_string(), DEFAULT_OUTPUT_NAME.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::AssetKey;

    #[test]
    fn test_diamond_materializes_expected_values() {
        for use_multi in [false, true] {
            let (store, io_manager) = asset_aware_io_manager();
            let result = diamond_group(use_multi, false, io_manager)
                .materialize(None)
                .unwrap();
            assert!(result.success());
            for (name, value) in DIAMOND_VALUES {
                assert_eq!(store.get(&AssetKey::from(name)), Some(json!(value)), "{}", name);
            }
        }
    }

    #[test]
    fn test_constant_io_manager_loads_its_value() {
        let manager = ConstantIoManager(json!(7));
        let context = InputContext {
            name: "x".into(),
            asset_key: None,
            upstream_output: None,
            partition_key: None,
        };
        assert_eq!(manager.load_input(&context).unwrap(), json!(7));
    }
}
