use std::collections::HashMap;

use serde::Serialize;

use crate::edge_type::EdgeType;

/// Dense index assigned to an identifier the first time it is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeHandle(usize);

impl NodeHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Directed graph with both adjacency orientations, a label table and the
/// classified type of every declared edge.
///
/// Adjacency lists keep duplicates when an edge is declared more than once;
/// deduplication happens during extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    ids: Vec<String>,
    index: HashMap<String, NodeHandle>,
    labels: Vec<Option<String>>,
    forward: Vec<Vec<NodeHandle>>,
    reverse: Vec<Vec<NodeHandle>>,
    edge_types: HashMap<(NodeHandle, NodeHandle), Option<EdgeType>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `id`, registering it with empty adjacency in
    /// both orientations on first sight.
    pub fn ensure(&mut self, id: &str) -> NodeHandle {
        if let Some(&handle) = self.index.get(id) {
            return handle;
        }
        let handle = NodeHandle(self.ids.len());
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), handle);
        self.labels.push(None);
        self.forward.push(Vec::new());
        self.reverse.push(Vec::new());
        handle
    }

    /// Records `label` unless the node already has one. Empty labels are
    /// treated as absent.
    pub fn set_label_if_absent(&mut self, node: NodeHandle, label: &str) {
        let slot = &mut self.labels[node.0];
        if slot.is_none() && !label.is_empty() {
            *slot = Some(label.to_string());
        }
    }

    /// Adds a declared edge. Self-loops are dropped and reported as `false`.
    pub fn add_edge(&mut self, from: NodeHandle, to: NodeHandle, edge_type: Option<EdgeType>) -> bool {
        if from == to {
            return false;
        }
        self.forward[from.0].push(to);
        self.reverse[to.0].push(from);
        self.edge_types.insert((from, to), edge_type);
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.iter().map(Vec::len).sum()
    }

    pub fn handle(&self, id: &str) -> Option<NodeHandle> {
        self.index.get(id).copied()
    }

    pub fn handles(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        (0..self.ids.len()).map(NodeHandle)
    }

    pub fn id(&self, node: NodeHandle) -> &str {
        &self.ids[node.0]
    }

    pub fn label(&self, node: NodeHandle) -> Option<&str> {
        self.labels[node.0].as_deref()
    }

    /// The label if one was declared, otherwise the identifier.
    pub fn display_label(&self, node: NodeHandle) -> &str {
        self.label(node).unwrap_or_else(|| self.id(node))
    }

    pub fn forward(&self, node: NodeHandle) -> &[NodeHandle] {
        &self.forward[node.0]
    }

    pub fn reverse(&self, node: NodeHandle) -> &[NodeHandle] {
        &self.reverse[node.0]
    }

    /// Classified type of the edge exactly as declared (`from -> to`).
    /// The outer `None` means no such edge was declared.
    pub fn edge_type(&self, from: NodeHandle, to: NodeHandle) -> Option<Option<EdgeType>> {
        self.edge_types.get(&(from, to)).copied()
    }

    /// Identifier → label for every node that carries a label.
    pub fn label_table(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.ids
            .iter()
            .zip(&self.labels)
            .filter_map(|(id, label)| label.as_deref().map(|l| (id.as_str(), l)))
    }
}
