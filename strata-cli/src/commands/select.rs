//! Select command

use anyhow::Result;
use strata_runtime::{AssetGroup, Selection};

/// Print the keys a selection resolves to, one per line
pub fn execute(group: &AssetGroup, clauses: Vec<String>) -> Result<()> {
    let selection = Selection::from(clauses);
    tracing::debug!(%selection, "Resolving selection");

    let keys = group.resolve_selection(Some(&selection))?;
    for key in &keys {
        println!("{}", key.to_user_string());
    }
    tracing::info!("{} assets selected", keys.len());

    Ok(())
}
