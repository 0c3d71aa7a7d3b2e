//! Asset selection expressions
//!
//! A selection is a list of clauses; the selected keys are the union of what
//! each clause resolves to. A clause names one asset (namespace segments
//! joined with `>`) and optionally extends it upstream with leading `+`/`*`
//! and downstream with trailing `+`/`*`:
//!
//! - `f` selects `f` only
//! - `+f` adds direct dependencies, `++f` two hops of dependencies
//! - `*f` adds every transitive dependency
//! - `f+`, `f++`, `f*` do the same downstream
//! - `*` selects every produced asset
//!
//! Only produced keys are selectable; source assets never match.

use crate::graph::AssetGraph;
use crate::queries::LineageQuery;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;
use strata_core::{AssetKey, Error, Result};
use tracing::debug;

static CLAUSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*?\+*)?([.>\w\[\]?_-]+)(\+*\*?)?$").expect("Invalid selection clause regex")
});

/// Clause selecting every produced asset
pub const SELECT_ALL: &str = "*";

/// One or more selection clauses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection(Vec<String>);

impl Selection {
    /// Selection of every produced asset
    pub fn all() -> Self {
        Self(vec![SELECT_ALL.to_string()])
    }

    pub fn clauses(&self) -> &[String] {
        &self.0
    }

    pub fn is_all(&self) -> bool {
        self.0.iter().any(|c| c.trim() == SELECT_ALL)
    }
}

impl From<&str> for Selection {
    fn from(clause: &str) -> Self {
        Self(vec![clause.to_string()])
    }
}

impl From<String> for Selection {
    fn from(clause: String) -> Self {
        Self(vec![clause])
    }
}

impl From<Vec<String>> for Selection {
    fn from(clauses: Vec<String>) -> Self {
        Self(clauses)
    }
}

impl From<Vec<&str>> for Selection {
    fn from(clauses: Vec<&str>) -> Self {
        Self(clauses.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Selection {
    fn from(clauses: [&str; N]) -> Self {
        Self(clauses.iter().map(|c| c.to_string()).collect())
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// How far a clause extends in one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Hops(usize),
    Unbounded,
}

impl Depth {
    fn parse(part: &str) -> Option<Self> {
        if part.contains('*') {
            Some(Self::Unbounded)
        } else if part.chars().all(|c| c == '+') {
            Some(Self::Hops(part.len()))
        } else {
            None
        }
    }

    fn max_depth(self) -> Option<usize> {
        match self {
            Self::Hops(n) => Some(n),
            Self::Unbounded => None,
        }
    }
}

/// A parsed selection clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub upstream: Depth,
    pub key: AssetKey,
    pub downstream: Depth,
}

impl Clause {
    /// Parse a single clause; `None` when it does not match the grammar
    pub fn parse(clause: &str) -> Option<Self> {
        let captures = CLAUSE_PATTERN.captures(clause.trim())?;
        let part = |idx: usize| captures.get(idx).map(|m| m.as_str()).unwrap_or("");

        Some(Self {
            upstream: Depth::parse(part(1))?,
            key: AssetKey::from_user_string(part(2)),
            downstream: Depth::parse(part(3))?,
        })
    }
}

/// Resolves selections against an asset graph
pub struct SelectionResolver<'a> {
    graph: &'a AssetGraph,
}

impl<'a> SelectionResolver<'a> {
    pub fn new(graph: &'a AssetGraph) -> Self {
        Self { graph }
    }

    /// Resolve a selection to the set of produced keys it names
    ///
    /// Fails with [`Error::InvalidSubset`] on the first clause that matches
    /// no produced asset.
    pub fn resolve(&self, selection: &Selection) -> Result<BTreeSet<AssetKey>> {
        if selection.is_all() {
            return Ok(self.graph.produced_keys());
        }

        let mut selected = BTreeSet::new();
        for clause in selection.clauses() {
            let keys = self.resolve_clause(clause)?;
            debug!(clause = %clause, selected = keys.len(), "Resolved selection clause");
            selected.extend(keys);
        }
        Ok(selected)
    }

    fn resolve_clause(&self, clause: &str) -> Result<BTreeSet<AssetKey>> {
        let parsed = Clause::parse(clause)
            .filter(|parsed| self.graph.is_produced(&parsed.key))
            .ok_or_else(|| {
                Error::InvalidSubset(format!(
                    "No qualified assets to execute found for clause='{}'",
                    clause
                ))
            })?;

        let query = LineageQuery::new(self.graph);
        let upstream = query.ancestors_with_depth(&parsed.key, parsed.upstream.max_depth());
        let downstream = query.descendants_with_depth(&parsed.key, parsed.downstream.max_depth());

        let mut keys = BTreeSet::from([parsed.key]);
        keys.extend(
            upstream
                .into_iter()
                .chain(downstream)
                .map(|(key, _)| key)
                .filter(|key| self.graph.is_produced(key)),
        );
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{AssetsDefinition, SourceAsset};

    // start -> a -> d -> f
    // b -> c -> e -> f
    // b -> d; a, d -> final
    fn diamond() -> AssetGraph {
        let assets = vec![
            AssetsDefinition::asset("start").build(),
            AssetsDefinition::asset("a").input("start").build(),
            AssetsDefinition::asset("b").build(),
            AssetsDefinition::asset("c").input("b").build(),
            AssetsDefinition::asset("d").input("a").input("b").build(),
            AssetsDefinition::asset("e").input("c").build(),
            AssetsDefinition::asset("f").input("d").input("e").build(),
            AssetsDefinition::asset("final").input("a").input("d").build(),
        ];
        AssetGraph::from_definitions(&assets, &[])
    }

    fn keys(names: &str) -> BTreeSet<AssetKey> {
        names.split(',').map(AssetKey::from).collect()
    }

    fn resolve(selection: impl Into<Selection>) -> Result<BTreeSet<AssetKey>> {
        let graph = diamond();
        SelectionResolver::new(&graph).resolve(&selection.into())
    }

    #[test]
    fn test_parse_clause_depths() {
        let clause = Clause::parse("++core>models>f*").unwrap();
        assert_eq!(clause.upstream, Depth::Hops(2));
        assert_eq!(clause.key, AssetKey::new(["core", "models", "f"]));
        assert_eq!(clause.downstream, Depth::Unbounded);

        let clause = Clause::parse("a").unwrap();
        assert_eq!(clause.upstream, Depth::Hops(0));
        assert_eq!(clause.downstream, Depth::Hops(0));
    }

    #[test]
    fn test_parse_clause_rejects_garbage() {
        assert!(Clause::parse("a b").is_none());
        assert!(Clause::parse("+").is_none());
        assert!(Clause::parse("").is_none());
    }

    #[test]
    fn test_select_all() {
        assert_eq!(resolve("*").unwrap(), keys("start,a,b,c,d,e,f,final"));
        assert_eq!(resolve(["a", "*"]).unwrap().len(), 8);
    }

    #[test]
    fn test_single_hop_upstream() {
        assert_eq!(resolve("+f").unwrap(), keys("f,d,e"));
    }

    #[test]
    fn test_two_hops_upstream() {
        assert_eq!(resolve("++f").unwrap(), keys("f,d,e,c,a,b"));
    }

    #[test]
    fn test_downstream() {
        assert_eq!(resolve("b+").unwrap(), keys("b,c,d"));
        assert_eq!(resolve("start*").unwrap(), keys("start,a,d,f,final"));
    }

    #[test]
    fn test_union_of_clauses() {
        assert_eq!(resolve(["+a", "b+"]).unwrap(), keys("start,a,b,c,d"));
        assert_eq!(resolve(["*c", "final"]).unwrap(), keys("b,c,final"));
    }

    #[test]
    fn test_unknown_clause_names_clause() {
        let err = resolve(["start", "x"]).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidSubset("No qualified assets to execute found for clause='x'".into())
        );
    }

    #[test]
    fn test_source_assets_are_not_selectable() {
        let assets = vec![AssetsDefinition::asset("asset1").namespace(["abc"]).build()];
        let sources = vec![SourceAsset::new(["apple", "banana"])];
        let graph = AssetGraph::from_definitions(&assets, &sources);
        let resolver = SelectionResolver::new(&graph);

        assert_eq!(
            resolver.resolve(&"abc>asset1".into()).unwrap(),
            BTreeSet::from([AssetKey::new(["abc", "asset1"])])
        );
        assert!(resolver
            .resolve(&"apple>banana".into())
            .unwrap_err()
            .is_invalid_subset());
    }

    #[test]
    fn test_traversal_skips_source_keys() {
        let assets = vec![AssetsDefinition::asset("a").input("src").build()];
        let graph = AssetGraph::from_definitions(&assets, &[SourceAsset::new("src")]);
        let selected = SelectionResolver::new(&graph).resolve(&"*a".into()).unwrap();
        assert_eq!(selected, keys("a"));
    }
}
