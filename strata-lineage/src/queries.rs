//! Lineage query operations
//!
//! This module provides query capabilities for traversing the asset graph.
//! It supports:
//! - Finding ancestors (upstream dependencies)
//! - Finding descendants (downstream dependents)
//! - Path finding between assets
//! - Depth-limited traversals, used by selection resolution

use crate::graph::AssetGraph;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use strata_core::AssetKey;

/// Query builder for lineage operations
pub struct LineageQuery<'a> {
    graph: &'a AssetGraph,
}

impl<'a> LineageQuery<'a> {
    /// Create a new query for the given graph
    pub fn new(graph: &'a AssetGraph) -> Self {
        Self { graph }
    }

    /// Direct dependencies of an asset
    pub fn ancestors(&self, key: &AssetKey) -> Vec<AssetKey> {
        self.graph
            .get_upstream(key)
            .iter()
            .map(|node| node.key.clone())
            .collect()
    }

    /// Direct dependents of an asset
    pub fn descendants(&self, key: &AssetKey) -> Vec<AssetKey> {
        self.graph
            .get_downstream(key)
            .iter()
            .map(|node| node.key.clone())
            .collect()
    }

    /// Find all ancestors (upstream) up to a maximum depth
    ///
    /// A depth of 0 returns no ancestors, depth of 1 returns direct ancestors,
    /// depth of 2 includes ancestors of ancestors, etc.
    ///
    /// # Returns
    /// A vector of (AssetKey, depth) tuples sorted by depth (closest first)
    pub fn ancestors_with_depth(
        &self,
        key: &AssetKey,
        max_depth: Option<usize>,
    ) -> Vec<(AssetKey, usize)> {
        self.traverse_with_depth(key, Direction::Incoming, max_depth)
    }

    /// Find all descendants (downstream) up to a maximum depth
    pub fn descendants_with_depth(
        &self,
        key: &AssetKey,
        max_depth: Option<usize>,
    ) -> Vec<(AssetKey, usize)> {
        self.traverse_with_depth(key, Direction::Outgoing, max_depth)
    }

    /// Get full lineage information for an asset
    pub fn full_lineage(&self, key: &AssetKey) -> LineageInfo {
        let upstream = self.ancestors_with_depth(key, None);
        let downstream = self.descendants_with_depth(key, None);

        let max_upstream_depth = upstream.iter().map(|(_, d)| *d).max().unwrap_or(0);
        let max_downstream_depth = downstream.iter().map(|(_, d)| *d).max().unwrap_or(0);

        LineageInfo {
            asset_key: key.clone(),
            upstream_count: upstream.len(),
            downstream_count: downstream.len(),
            upstream_assets: upstream,
            downstream_assets: downstream,
            max_upstream_depth,
            max_downstream_depth,
        }
    }

    /// Find the shortest dependency path between two assets
    ///
    /// The path runs from `from` to `to`, inclusive.
    pub fn path(&self, from: &AssetKey, to: &AssetKey) -> Option<Vec<AssetKey>> {
        let graph = self.graph.inner_graph();

        let from_idx = self.graph.get_node_index(from)?;
        let to_idx = self.graph.get_node_index(to)?;

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

        queue.push_back(from_idx);
        visited.insert(from_idx);

        while let Some(current) = queue.pop_front() {
            if current == to_idx {
                let mut path = vec![graph[to_idx].key.clone()];
                let mut curr = to_idx;
                while let Some(&prev) = parent.get(&curr) {
                    path.push(graph[prev].key.clone());
                    curr = prev;
                }
                path.reverse();
                return Some(path);
            }

            for neighbor in graph.neighbors_directed(current, Direction::Outgoing) {
                if visited.insert(neighbor) {
                    parent.insert(neighbor, current);
                    queue.push_back(neighbor);
                }
            }
        }

        None
    }

    pub fn is_reachable(&self, from: &AssetKey, to: &AssetKey) -> bool {
        self.path(from, to).is_some()
    }

    /// Assets that are ancestors of both inputs
    pub fn common_ancestors(&self, first: &AssetKey, second: &AssetKey) -> BTreeSet<AssetKey> {
        let first: BTreeSet<_> = self
            .ancestors_with_depth(first, None)
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        self.ancestors_with_depth(second, None)
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| first.contains(key))
            .collect()
    }

    /// Keys with no dependencies
    pub fn roots(&self) -> Vec<AssetKey> {
        self.graph.roots()
    }

    /// Keys with no dependents
    pub fn leaves(&self) -> Vec<AssetKey> {
        self.graph.leaves()
    }

    /// Shortest path length between two assets
    pub fn distance(&self, from: &AssetKey, to: &AssetKey) -> Option<usize> {
        self.path(from, to).map(|p| p.len().saturating_sub(1))
    }

    fn traverse_with_depth(
        &self,
        start: &AssetKey,
        direction: Direction,
        max_depth: Option<usize>,
    ) -> Vec<(AssetKey, usize)> {
        let graph = self.graph.inner_graph();

        let start_idx = match self.graph.get_node_index(start) {
            Some(idx) => idx,
            None => return Vec::new(),
        };
        if max_depth == Some(0) {
            return Vec::new();
        }

        let mut result = Vec::new();
        let mut visited = HashSet::from([start_idx]);
        let mut queue = VecDeque::new();

        // Initialize with direct neighbors at depth 1
        for neighbor in graph.neighbors_directed(start_idx, direction) {
            if visited.insert(neighbor) {
                queue.push_back((neighbor, 1usize));
            }
        }

        while let Some((node_idx, depth)) = queue.pop_front() {
            result.push((graph[node_idx].key.clone(), depth));

            let should_continue = max_depth.map(|m| depth < m).unwrap_or(true);
            if should_continue {
                for neighbor in graph.neighbors_directed(node_idx, direction) {
                    if visited.insert(neighbor) {
                        queue.push_back((neighbor, depth + 1));
                    }
                }
            }
        }

        // BFS already yields depth order; sort ties by key for stable output
        result.sort_by(|(a, da), (b, db)| da.cmp(db).then_with(|| a.cmp(b)));
        result
    }
}

/// Full lineage information for an asset
#[derive(Debug, Clone, Serialize)]
pub struct LineageInfo {
    /// The asset being queried
    pub asset_key: AssetKey,

    /// Total count of upstream assets
    pub upstream_count: usize,

    /// Total count of downstream assets
    pub downstream_count: usize,

    /// Upstream assets with their depth from the queried asset
    pub upstream_assets: Vec<(AssetKey, usize)>,

    /// Downstream assets with their depth from the queried asset
    pub downstream_assets: Vec<(AssetKey, usize)>,

    /// Maximum depth in the upstream direction
    pub max_upstream_depth: usize,

    /// Maximum depth in the downstream direction
    pub max_downstream_depth: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AssetNode;

    fn key(name: &str) -> AssetKey {
        AssetKey::from(name)
    }

    // A -> B -> C -> D
    //       \-> E
    fn create_test_graph() -> AssetGraph {
        let mut graph = AssetGraph::new();
        for name in ["A", "B", "C", "D", "E"] {
            graph.add_node(AssetNode::produced(key(name), name));
        }
        for (from, to) in [("A", "B"), ("B", "C"), ("C", "D"), ("B", "E")] {
            graph.add_edge(&key(from), &key(to)).unwrap();
        }
        graph
    }

    #[test]
    fn test_direct_neighbors() {
        let graph = create_test_graph();
        let query = LineageQuery::new(&graph);

        assert_eq!(query.ancestors(&key("B")), vec![key("A")]);
        let mut descendants = query.descendants(&key("B"));
        descendants.sort();
        assert_eq!(descendants, vec![key("C"), key("E")]);
    }

    #[test]
    fn test_path_exists() {
        let graph = create_test_graph();
        let query = LineageQuery::new(&graph);

        let path = query.path(&key("A"), &key("D")).unwrap();
        assert_eq!(path, vec![key("A"), key("B"), key("C"), key("D")]);
    }

    #[test]
    fn test_path_not_exists() {
        let graph = create_test_graph();
        let query = LineageQuery::new(&graph);
        assert!(query.path(&key("E"), &key("D")).is_none());
        assert!(query.is_reachable(&key("A"), &key("E")));
        assert!(!query.is_reachable(&key("E"), &key("A")));
    }

    #[test]
    fn test_ancestors_with_depth() {
        let graph = create_test_graph();
        let query = LineageQuery::new(&graph);

        let ancestors = query.ancestors_with_depth(&key("D"), None);
        assert_eq!(
            ancestors,
            vec![(key("C"), 1), (key("B"), 2), (key("A"), 3)]
        );

        let ancestors = query.ancestors_with_depth(&key("D"), Some(1));
        assert_eq!(ancestors, vec![(key("C"), 1)]);

        assert!(query.ancestors_with_depth(&key("D"), Some(0)).is_empty());
    }

    #[test]
    fn test_descendants_with_depth() {
        let graph = create_test_graph();
        let query = LineageQuery::new(&graph);

        let descendants = query.descendants_with_depth(&key("A"), Some(2));
        assert_eq!(
            descendants,
            vec![(key("B"), 1), (key("C"), 2), (key("E"), 2)]
        );
    }

    #[test]
    fn test_unknown_key_has_no_lineage() {
        let graph = create_test_graph();
        let query = LineageQuery::new(&graph);
        assert!(query.ancestors_with_depth(&key("Z"), None).is_empty());
    }

    #[test]
    fn test_distance() {
        let graph = create_test_graph();
        let query = LineageQuery::new(&graph);
        assert_eq!(query.distance(&key("A"), &key("B")), Some(1));
        assert_eq!(query.distance(&key("A"), &key("D")), Some(3));
        assert_eq!(query.distance(&key("D"), &key("A")), None);
    }

    #[test]
    fn test_common_ancestors() {
        let graph = create_test_graph();
        let query = LineageQuery::new(&graph);
        assert_eq!(
            query.common_ancestors(&key("D"), &key("E")),
            BTreeSet::from([key("A"), key("B")])
        );
    }

    #[test]
    fn test_full_lineage() {
        let graph = create_test_graph();
        let query = LineageQuery::new(&graph);
        let lineage = query.full_lineage(&key("B"));

        assert_eq!(lineage.asset_key, key("B"));
        assert_eq!(lineage.upstream_count, 1);
        assert_eq!(lineage.downstream_count, 3);
        assert_eq!(lineage.max_downstream_depth, 2);
    }

    #[test]
    fn test_roots_and_leaves() {
        let graph = create_test_graph();
        let query = LineageQuery::new(&graph);
        assert_eq!(query.roots(), vec![key("A")]);
        assert_eq!(query.leaves(), vec![key("D"), key("E")]);
    }
}
