//! Asset dependency graph
//!
//! Nodes are asset keys, edges point from a dependency to its dependent. The
//! graph is derived from asset definitions on demand and never stored.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use strata_core::{AssetKey, AssetsDefinition, SourceAsset};
use std::collections::{BTreeSet, HashMap};

/// Whether a key is produced by a definition or only referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Produced,
    Source,
}

/// Node in the asset graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetNode {
    pub key: AssetKey,
    pub kind: NodeKind,

    /// Definition producing the key
    pub node_name: Option<String>,
}

impl AssetNode {
    pub fn produced(key: AssetKey, node_name: impl Into<String>) -> Self {
        Self {
            key,
            kind: NodeKind::Produced,
            node_name: Some(node_name.into()),
        }
    }

    pub fn source(key: AssetKey) -> Self {
        Self {
            key,
            kind: NodeKind::Source,
            node_name: None,
        }
    }

    pub fn is_produced(&self) -> bool {
        self.kind == NodeKind::Produced
    }
}

/// Dependency graph over asset keys
#[derive(Debug, Clone)]
pub struct AssetGraph {
    graph: DiGraph<AssetNode, ()>,
    key_to_node: HashMap<AssetKey, NodeIndex>,
}

impl AssetGraph {
    /// Create a new empty asset graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            key_to_node: HashMap::new(),
        }
    }

    /// Build the graph of the keys selected on `assets`
    ///
    /// Dependencies on keys that are neither produced nor declared as source
    /// assets are added as source nodes.
    pub fn from_definitions(assets: &[AssetsDefinition], source_assets: &[SourceAsset]) -> Self {
        let mut graph = Self::new();

        for asset in assets {
            for key in asset.asset_keys() {
                graph.add_node(AssetNode::produced(key.clone(), asset.node_name()));
            }
        }
        for source in source_assets {
            graph.add_node(AssetNode::source(source.key.clone()));
        }

        for asset in assets {
            for key in asset.asset_keys() {
                for dep in asset.deps_for(key) {
                    let from = graph.add_node(AssetNode::source(dep));
                    let to = graph.key_to_node[key];
                    graph.graph.update_edge(from, to, ());
                }
            }
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Built asset graph"
        );
        graph
    }

    /// Add a node to the graph
    ///
    /// Adding a key twice keeps the first node, except that a produced node
    /// replaces a source node for the same key.
    pub fn add_node(&mut self, node: AssetNode) -> NodeIndex {
        if let Some(&idx) = self.key_to_node.get(&node.key) {
            if node.is_produced() && !self.graph[idx].is_produced() {
                self.graph[idx] = node;
            }
            return idx;
        }
        let key = node.key.clone();
        let idx = self.graph.add_node(node);
        self.key_to_node.insert(key, idx);
        idx
    }

    /// Add an edge from a dependency to its dependent
    pub fn add_edge(&mut self, from: &AssetKey, to: &AssetKey) -> crate::Result<()> {
        let from_idx = self
            .get_node_index(from)
            .ok_or_else(|| crate::Error::NodeNotFound(from.to_string()))?;
        let to_idx = self
            .get_node_index(to)
            .ok_or_else(|| crate::Error::NodeNotFound(to.to_string()))?;

        self.graph.update_edge(from_idx, to_idx, ());
        Ok(())
    }

    pub fn node(&self, key: &AssetKey) -> Option<&AssetNode> {
        self.get_node_index(key).map(|idx| &self.graph[idx])
    }

    pub fn contains(&self, key: &AssetKey) -> bool {
        self.key_to_node.contains_key(key)
    }

    /// Whether `key` is produced by a definition in the graph
    pub fn is_produced(&self, key: &AssetKey) -> bool {
        self.node(key).map(AssetNode::is_produced).unwrap_or(false)
    }

    /// All produced keys, sorted
    pub fn produced_keys(&self) -> BTreeSet<AssetKey> {
        self.graph
            .node_weights()
            .filter(|n| n.is_produced())
            .map(|n| n.key.clone())
            .collect()
    }

    /// Direct dependencies of an asset
    pub fn get_upstream(&self, key: &AssetKey) -> Vec<&AssetNode> {
        self.neighbors(key, Direction::Incoming)
    }

    /// Direct dependents of an asset
    pub fn get_downstream(&self, key: &AssetKey) -> Vec<&AssetNode> {
        self.neighbors(key, Direction::Outgoing)
    }

    fn neighbors(&self, key: &AssetKey, direction: Direction) -> Vec<&AssetNode> {
        match self.key_to_node.get(key) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, direction)
                .map(|n| &self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Keys with no dependencies, sorted
    pub fn roots(&self) -> Vec<AssetKey> {
        self.externals(Direction::Incoming)
    }

    /// Keys with no dependents, sorted
    pub fn leaves(&self) -> Vec<AssetKey> {
        self.externals(Direction::Outgoing)
    }

    fn externals(&self, direction: Direction) -> Vec<AssetKey> {
        let mut keys: Vec<AssetKey> = self
            .graph
            .externals(direction)
            .map(|idx| self.graph[idx].key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Check if the graph has cycles
    pub fn has_cycles(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub(crate) fn inner_graph(&self) -> &DiGraph<AssetNode, ()> {
        &self.graph
    }

    pub(crate) fn get_node_index(&self, key: &AssetKey) -> Option<NodeIndex> {
        self.key_to_node.get(key).copied()
    }
}

impl Default for AssetGraph {
    fn default() -> Self {
        Self::new()
    }
}
