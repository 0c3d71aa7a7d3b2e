//! CLI command implementations

pub mod lineage;
pub mod materialize;
pub mod partitions;
pub mod plan;
pub mod select;

use strata_runtime::Selection;

/// Selection from repeated `--select` values; everything when none are given
pub(crate) fn selection(clauses: &[String]) -> Option<Selection> {
    if clauses.is_empty() {
        None
    } else {
        Some(Selection::from(clauses.to_vec()))
    }
}
