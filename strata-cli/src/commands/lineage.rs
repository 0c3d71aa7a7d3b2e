//! Lineage command

use anyhow::Result;
use strata_core::AssetKey;
use strata_lineage::LineageQuery;
use strata_runtime::AssetGroup;

pub fn execute(
    group: &AssetGroup,
    name: &str,
    upstream: bool,
    downstream: bool,
    depth: Option<usize>,
) -> Result<()> {
    let graph = group.asset_graph();
    let key = AssetKey::from_user_string(name);
    if !graph.contains(&key) {
        anyhow::bail!("Asset '{}' not found", name);
    }

    tracing::info!("Showing lineage for: {}", name);
    let query = LineageQuery::new(&graph);

    // Show both by default
    let (upstream, downstream) = if !upstream && !downstream {
        (true, true)
    } else {
        (upstream, downstream)
    };

    if upstream {
        println!("Upstream:");
        print_level(&query.ancestors_with_depth(&key, depth));
    }
    if downstream {
        println!("Downstream:");
        print_level(&query.descendants_with_depth(&key, depth));
    }

    Ok(())
}

fn print_level(keys: &[(AssetKey, usize)]) {
    if keys.is_empty() {
        println!("  (none)");
    }
    for (key, depth) in keys {
        println!("  {}{}", "  ".repeat(depth.saturating_sub(1)), key.to_user_string());
    }
}
