use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::edge_type::{EdgeType, UnlabeledEdges};
use crate::graph::{Graph, NodeHandle};
use crate::traversal::TraversalRecord;

/// How extremal nodes are chosen among the visited set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExtremalPolicy {
    /// Nodes at the deepest level the traversal reached.
    #[default]
    DeepestLevel,
    /// Nodes with no visited neighbor in the walked orientation.
    Sink,
}

/// Which hops become output edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// Every hop examined between two visited nodes.
    #[default]
    All,
    /// Only parent to child hops of the traversal tree.
    Tree,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub handle: NodeHandle,
    pub id: String,
    pub label: String,
    pub level: usize,
    pub is_extremal: bool,
    /// Hops on the root path; only known for extremal nodes.
    pub steps: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRecord {
    pub from: NodeHandle,
    pub to: NodeHandle,
    pub from_id: String,
    pub to_id: String,
    pub edge_type: Option<EdgeType>,
    pub abbr: Option<&'static str>,
    pub level: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootPath {
    pub node: NodeHandle,
    pub path: Vec<NodeHandle>,
}

impl RootPath {
    pub fn steps(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subgraph {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    pub max_level: usize,
    /// Extremal nodes in visitation order, each with its path from the start.
    pub paths: Vec<RootPath>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub extremal: ExtremalPolicy,
    pub edge_mode: EdgeMode,
    pub unlabeled_edges: UnlabeledEdges,
}

pub fn extract(graph: &Graph, record: &TraversalRecord, options: ExtractOptions) -> Subgraph {
    let max_level = record.max_level();
    let has_visited_hop: HashSet<NodeHandle> = match options.extremal {
        ExtremalPolicy::DeepestLevel => HashSet::new(),
        ExtremalPolicy::Sink => record
            .edges
            .iter()
            .filter(|e| e.from != e.to && record.is_visited(e.to))
            .map(|e| e.from)
            .collect(),
    };
    let is_extremal = |node: NodeHandle| match options.extremal {
        ExtremalPolicy::DeepestLevel => record.level(node) == Some(max_level),
        ExtremalPolicy::Sink => !has_visited_hop.contains(&node),
    };

    let paths: Vec<RootPath> = record
        .order
        .iter()
        .copied()
        .filter(|&n| is_extremal(n))
        .map(|node| RootPath {
            node,
            path: record.root_path(node),
        })
        .collect();
    let steps: HashMap<NodeHandle, usize> = paths.iter().map(|p| (p.node, p.steps())).collect();

    let nodes = record
        .order
        .iter()
        .map(|&node| NodeRecord {
            handle: node,
            id: graph.id(node).to_string(),
            label: graph.display_label(node).to_string(),
            level: record.level(node).unwrap_or(0),
            is_extremal: steps.contains_key(&node),
            steps: steps.get(&node).copied(),
        })
        .collect();

    let hops: Vec<(NodeHandle, NodeHandle, usize)> = match options.edge_mode {
        EdgeMode::All => record.edges.iter().map(|e| (e.from, e.to, e.level)).collect(),
        EdgeMode::Tree => record
            .order
            .iter()
            .filter_map(|&n| Some((record.parent(n)?, n, record.level(n)?)))
            .collect(),
    };

    let mut seen = HashSet::new();
    let edges = hops
        .into_iter()
        .filter(|&(from, to, _)| from != to && record.is_visited(from) && record.is_visited(to))
        .filter(|&(from, to, _)| seen.insert((from, to)))
        .map(|(from, to, level)| {
            let (declared_from, declared_to) = record.direction.declared(from, to);
            let classified = graph.edge_type(declared_from, declared_to).flatten();
            let edge_type = options.unlabeled_edges.resolve(classified);
            EdgeRecord {
                from,
                to,
                from_id: graph.id(from).to_string(),
                to_id: graph.id(to).to_string(),
                edge_type,
                abbr: edge_type.map(EdgeType::abbr),
                level,
            }
        })
        .collect();

    Subgraph {
        nodes,
        edges,
        max_level,
        paths,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot_parser::parse_dot;
    use crate::traversal::{Algorithm, Direction, traverse};
    use pretty_assertions::assert_eq;

    fn run(text: &str, start: &str, direction: Direction, depth: usize, options: ExtractOptions) -> Subgraph {
        let g = parse_dot(text);
        let record = traverse(&g, g.handle(start).unwrap(), direction, Algorithm::Bfs, depth);
        extract(&g, &record, options)
    }

    fn pairs(sub: &Subgraph) -> Vec<(&str, &str)> {
        sub.edges
            .iter()
            .map(|e| (e.from_id.as_str(), e.to_id.as_str()))
            .collect()
    }

    #[test]
    fn chain_of_three() {
        let sub = run("A -> B\nB -> C\n", "A", Direction::Downstream, 5, ExtractOptions::default());
        let nodes: Vec<_> = sub.nodes.iter().map(|n| (n.id.as_str(), n.level)).collect();
        assert_eq!(nodes, vec![("A", 0), ("B", 1), ("C", 2)]);
        assert_eq!(pairs(&sub), vec![("A", "B"), ("B", "C")]);
        assert_eq!(sub.max_level, 2);
        assert!(sub.nodes[2].is_extremal);
        assert_eq!(sub.nodes[2].steps, Some(2));
        assert_eq!(sub.nodes[0].steps, None);
    }

    #[test]
    fn duplicate_declarations_collapse() {
        let sub = run("a -> b\na -> b\n", "a", Direction::Downstream, 5, ExtractOptions::default());
        assert_eq!(pairs(&sub), vec![("a", "b")]);
    }

    #[test]
    fn edges_to_cut_off_nodes_are_dropped() {
        let sub = run("a -> b\nb -> c\n", "a", Direction::Downstream, 1, ExtractOptions::default());
        assert_eq!(pairs(&sub), vec![("a", "b")]);
        assert_eq!(sub.nodes.len(), 2);
    }

    #[test]
    fn labels_fall_back_to_identifier() {
        let sub = run("a [label=\"Alpha\"]\na -> b\n", "a", Direction::Downstream, 5, ExtractOptions::default());
        assert_eq!(sub.nodes[0].label, "Alpha");
        assert_eq!(sub.nodes[1].label, "b");
    }

    #[test]
    fn upstream_edge_types_use_declared_pair() {
        let sub = run(
            "base -> q [label=\"gguf\"]\n",
            "q",
            Direction::Upstream,
            5,
            ExtractOptions::default(),
        );
        assert_eq!(pairs(&sub), vec![("q", "base")]);
        assert_eq!(sub.edges[0].edge_type, Some(EdgeType::Quantized));
        assert_eq!(sub.edges[0].abbr, Some("QN"));
    }

    #[test]
    fn unlabeled_policy_applies() {
        let text = "a -> b\n";
        let ft = run(text, "a", Direction::Downstream, 5, ExtractOptions::default());
        assert_eq!(ft.edges[0].abbr, Some("FT"));
        let none = run(
            text,
            "a",
            Direction::Downstream,
            5,
            ExtractOptions {
                unlabeled_edges: UnlabeledEdges::None,
                ..Default::default()
            },
        );
        assert_eq!(none.edges[0].edge_type, None);
        assert_eq!(none.edges[0].abbr, None);
    }

    #[test]
    fn sink_policy_differs_under_cutoff() {
        let text = "a -> b\na -> c\nc -> d\n";
        let deepest = run(text, "a", Direction::Downstream, 5, ExtractOptions::default());
        let flagged: Vec<_> = deepest.nodes.iter().filter(|n| n.is_extremal).map(|n| n.id.as_str()).collect();
        assert_eq!(flagged, vec!["d"]);

        let sink = run(
            text,
            "a",
            Direction::Downstream,
            5,
            ExtractOptions {
                extremal: ExtremalPolicy::Sink,
                ..Default::default()
            },
        );
        let flagged: Vec<_> = sink.nodes.iter().filter(|n| n.is_extremal).map(|n| n.id.as_str()).collect();
        assert_eq!(flagged, vec!["b", "d"]);
    }

    #[test]
    fn sink_policy_ignores_hops_past_cutoff() {
        let sink = run(
            "a -> b\nb -> c\n",
            "a",
            Direction::Downstream,
            1,
            ExtractOptions {
                extremal: ExtremalPolicy::Sink,
                ..Default::default()
            },
        );
        let flagged: Vec<_> = sink.nodes.iter().filter(|n| n.is_extremal).map(|n| n.id.as_str()).collect();
        assert_eq!(flagged, vec!["b"]);
    }

    #[test]
    fn tree_mode_keeps_parent_edges_only() {
        let sub = run(
            "a -> b\na -> c\nb -> c\n",
            "a",
            Direction::Downstream,
            5,
            ExtractOptions {
                edge_mode: EdgeMode::Tree,
                ..Default::default()
            },
        );
        assert_eq!(pairs(&sub), vec![("a", "b"), ("a", "c")]);
        assert_eq!(sub.edges[1].level, 1);
    }

    #[test]
    fn isolated_start_is_its_own_extremal() {
        let sub = run("solo\n", "solo", Direction::Downstream, 5, ExtractOptions::default());
        assert_eq!(sub.nodes.len(), 1);
        assert!(sub.nodes[0].is_extremal);
        assert_eq!(sub.nodes[0].steps, Some(0));
        assert!(sub.edges.is_empty());
    }
}
