//! Materialize command

use anyhow::Result;
use strata_runtime::{AssetGroup, RunEventKind};

/// Run the selected assets in process. Returns whether the run succeeded.
pub fn execute(group: &AssetGroup, clauses: &[String]) -> Result<bool> {
    let result = group.materialize(super::selection(clauses))?;

    for event in result.events() {
        match &event.kind {
            RunEventKind::AssetMaterialization { asset_key, partition } => match partition {
                Some(partition) => {
                    println!("Materialized {} [{}]", asset_key.to_user_string(), partition)
                }
                None => println!("Materialized {}", asset_key.to_user_string()),
            },
            RunEventKind::StepFailure { node, error } => {
                println!("Step {} failed: {}", node, error);
            }
            RunEventKind::StepSkipped { node } => println!("Step {} skipped", node),
            _ => {}
        }
    }

    println!(
        "Run {} {}",
        result.run_id(),
        if result.success() { "succeeded" } else { "failed" }
    );
    Ok(result.success())
}
