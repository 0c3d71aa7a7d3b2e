//! Plan command
//!
//! Shows the job a selection would build: nodes in execution order and where
//! each input is loaded from.

use anyhow::Result;
use strata_runtime::{AssetGroup, InputSource};

pub fn execute(group: &AssetGroup, job_name: &str, clauses: &[String]) -> Result<()> {
    let job = group.build_job(job_name, super::selection(clauses))?;

    println!("Job: {}", job.name());
    println!("Assets: {}", job.asset_keys().len());
    if let Some(executor) = job.executor() {
        println!("Executor: {}", executor.name());
    }
    println!();

    for (position, node) in job.nodes().iter().enumerate() {
        let keys: Vec<String> = node
            .definition
            .asset_keys()
            .iter()
            .map(|k| k.to_user_string())
            .collect();
        println!("{:>3}. {} [{}]", position + 1, node.name(), keys.join(", "));

        for input in &node.inputs {
            let source = match &input.source {
                InputSource::Upstream {
                    node_name,
                    output_name,
                } => format!("{}.{}", node_name, output_name),
                InputSource::External => "external".to_string(),
            };
            println!(
                "       {} <- {} via {} ({})",
                input.input_name,
                input.asset_key.to_user_string(),
                input.io_manager_key,
                source
            );
        }
    }

    Ok(())
}
