use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::graph::{Graph, NodeHandle};

/// Which adjacency orientation a traversal walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Along declared edges.
    #[default]
    #[value(alias = "down")]
    Downstream,
    /// Against declared edges.
    #[value(alias = "up")]
    Upstream,
}

impl Direction {
    /// Algorithm used when a request does not name one.
    pub fn default_algorithm(self) -> Algorithm {
        match self {
            Direction::Downstream => Algorithm::Dfs,
            Direction::Upstream => Algorithm::Bfs,
        }
    }

    fn neighbors(self, graph: &Graph, node: NodeHandle) -> &[NodeHandle] {
        match self {
            Direction::Downstream => graph.forward(node),
            Direction::Upstream => graph.reverse(node),
        }
    }

    /// The pair as it was declared in the source, for a hop walked
    /// `from -> to` in this direction.
    pub fn declared(self, from: NodeHandle, to: NodeHandle) -> (NodeHandle, NodeHandle) {
        match self {
            Direction::Downstream => (from, to),
            Direction::Upstream => (to, from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    Bfs,
    Dfs,
}

/// A hop taken during traversal, oriented the way the search moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalEdge {
    pub from: NodeHandle,
    pub to: NodeHandle,
    /// Level of `from` plus one.
    pub level: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraversalRecord {
    pub start: NodeHandle,
    pub direction: Direction,
    pub algorithm: Algorithm,
    pub max_depth: usize,
    levels: Vec<Option<usize>>,
    parents: Vec<Option<NodeHandle>>,
    /// Nodes in the order they were expanded.
    pub order: Vec<NodeHandle>,
    /// Every hop examined, including ones to nodes past the depth cutoff.
    pub edges: Vec<TraversalEdge>,
}

impl TraversalRecord {
    fn new(graph: &Graph, start: NodeHandle, direction: Direction, algorithm: Algorithm, max_depth: usize) -> Self {
        Self {
            start,
            direction,
            algorithm,
            max_depth,
            levels: vec![None; graph.len()],
            parents: vec![None; graph.len()],
            order: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn level(&self, node: NodeHandle) -> Option<usize> {
        self.levels[node.index()]
    }

    pub fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.parents[node.index()]
    }

    pub fn is_visited(&self, node: NodeHandle) -> bool {
        self.levels[node.index()].is_some()
    }

    pub fn max_level(&self) -> usize {
        self.order
            .iter()
            .filter_map(|&n| self.level(n))
            .max()
            .unwrap_or(0)
    }

    /// Nodes from the start to `node`, following parent pointers.
    pub fn root_path(&self, node: NodeHandle) -> Vec<NodeHandle> {
        let mut path = vec![node];
        let mut cur = node;
        while let Some(parent) = self.parent(cur) {
            path.push(parent);
            cur = parent;
        }
        path.reverse();
        path
    }
}

pub fn traverse(
    graph: &Graph,
    start: NodeHandle,
    direction: Direction,
    algorithm: Algorithm,
    max_depth: usize,
) -> TraversalRecord {
    match algorithm {
        Algorithm::Bfs => bfs(graph, start, direction, max_depth),
        Algorithm::Dfs => dfs(graph, start, direction, max_depth),
    }
}

/// Unit-cost frontier search. Levels are shortest hop counts.
pub fn bfs(graph: &Graph, start: NodeHandle, direction: Direction, max_depth: usize) -> TraversalRecord {
    let mut record = TraversalRecord::new(graph, start, direction, Algorithm::Bfs, max_depth);
    let mut queue = VecDeque::from([(start, 0)]);
    record.levels[start.index()] = Some(0);

    while let Some((node, depth)) = queue.pop_front() {
        record.order.push(node);
        for &nb in direction.neighbors(graph, node) {
            if nb == node {
                continue;
            }
            record.edges.push(TraversalEdge {
                from: node,
                to: nb,
                level: depth + 1,
            });
            if !record.is_visited(nb) && depth < max_depth {
                record.levels[nb.index()] = Some(depth + 1);
                record.parents[nb.index()] = Some(node);
                queue.push_back((nb, depth + 1));
            }
        }
    }
    record
}

/// Depth-first search on an explicit stack. Neighbors are pushed in reverse
/// so they pop in declaration order. A node's level is the depth at which it
/// is first popped, which need not be its shortest distance.
pub fn dfs(graph: &Graph, start: NodeHandle, direction: Direction, max_depth: usize) -> TraversalRecord {
    let mut record = TraversalRecord::new(graph, start, direction, Algorithm::Dfs, max_depth);
    let mut stack: Vec<(NodeHandle, usize, Option<NodeHandle>)> = vec![(start, 0, None)];

    while let Some((node, depth, parent)) = stack.pop() {
        if record.is_visited(node) {
            continue;
        }
        record.levels[node.index()] = Some(depth);
        record.parents[node.index()] = parent;
        record.order.push(node);

        for &nb in direction.neighbors(graph, node).iter().rev() {
            if nb == node {
                continue;
            }
            record.edges.push(TraversalEdge {
                from: node,
                to: nb,
                level: depth + 1,
            });
            if !record.is_visited(nb) && depth < max_depth {
                stack.push((nb, depth + 1, Some(node)));
            }
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot_parser::parse_dot;
    use pretty_assertions::assert_eq;

    fn ids(graph: &Graph, nodes: &[NodeHandle]) -> Vec<String> {
        nodes.iter().map(|&n| graph.id(n).to_string()).collect()
    }

    fn level_of(graph: &Graph, record: &TraversalRecord, id: &str) -> Option<usize> {
        record.level(graph.handle(id).unwrap())
    }

    #[test]
    fn bfs_levels_are_shortest() {
        let g = parse_dot("a -> b\nb -> c\na -> c\nc -> d\n");
        let a = g.handle("a").unwrap();
        let r = bfs(&g, a, Direction::Downstream, 10);
        assert_eq!(ids(&g, &r.order), vec!["a", "b", "c", "d"]);
        assert_eq!(level_of(&g, &r, "c"), Some(1));
        assert_eq!(level_of(&g, &r, "d"), Some(2));
        assert_eq!(r.max_level(), 2);
    }

    #[test]
    fn bfs_respects_depth_cutoff() {
        let g = parse_dot("a -> b\nb -> c\nc -> d\n");
        let r = bfs(&g, g.handle("a").unwrap(), Direction::Downstream, 2);
        assert_eq!(ids(&g, &r.order), vec!["a", "b", "c"]);
        assert_eq!(level_of(&g, &r, "d"), None);
        // The hop toward the cut-off node is still recorded.
        let last = r.edges.last().unwrap();
        assert_eq!((g.id(last.from), g.id(last.to), last.level), ("c", "d", 3));
    }

    #[test]
    fn bfs_records_cross_edges() {
        let g = parse_dot("a -> b\na -> c\nb -> c\n");
        let r = bfs(&g, g.handle("a").unwrap(), Direction::Downstream, 5);
        let hops: Vec<_> = r.edges.iter().map(|e| (g.id(e.from), g.id(e.to))).collect();
        assert_eq!(hops, vec![("a", "b"), ("a", "c"), ("b", "c")]);
        assert_eq!(g.id(r.parent(g.handle("c").unwrap()).unwrap()), "a");
    }

    #[test]
    fn upstream_walks_reverse_adjacency() {
        let g = parse_dot("base -> ft\nft -> q\n");
        let r = bfs(&g, g.handle("q").unwrap(), Direction::Upstream, 5);
        assert_eq!(ids(&g, &r.order), vec!["q", "ft", "base"]);
        let first = r.edges[0];
        assert_eq!((g.id(first.from), g.id(first.to)), ("q", "ft"));
        assert_eq!(
            Direction::Upstream.declared(first.from, first.to),
            (g.handle("ft").unwrap(), g.handle("q").unwrap())
        );
    }

    #[test]
    fn dfs_visits_in_declaration_order() {
        let g = parse_dot("a -> b\na -> c\nb -> d\nc -> e\n");
        let r = dfs(&g, g.handle("a").unwrap(), Direction::Downstream, 10);
        assert_eq!(ids(&g, &r.order), vec!["a", "b", "d", "c", "e"]);
    }

    #[test]
    fn dfs_level_is_depth_at_first_pop() {
        let g = parse_dot("a -> b\na -> c\nb -> c\n");
        let r = dfs(&g, g.handle("a").unwrap(), Direction::Downstream, 10);
        assert_eq!(ids(&g, &r.order), vec!["a", "b", "c"]);
        assert_eq!(level_of(&g, &r, "c"), Some(2));
        assert_eq!(ids(&g, &r.root_path(g.handle("c").unwrap())), vec!["a", "b", "c"]);
    }

    #[test]
    fn dfs_respects_depth_cutoff() {
        let g = parse_dot("a -> b\nb -> c\nc -> d\n");
        let r = dfs(&g, g.handle("a").unwrap(), Direction::Downstream, 1);
        assert_eq!(ids(&g, &r.order), vec!["a", "b"]);
    }

    #[test]
    fn cycles_terminate() {
        let g = parse_dot("a -> b\nb -> c\nc -> a\n");
        for algorithm in [Algorithm::Bfs, Algorithm::Dfs] {
            let r = traverse(&g, g.handle("a").unwrap(), Direction::Downstream, algorithm, 50);
            assert_eq!(r.order.len(), 3);
            assert_eq!(r.edges.len(), 3);
        }
    }

    #[test]
    fn root_path_of_start_is_itself() {
        let g = parse_dot("a -> b\n");
        let a = g.handle("a").unwrap();
        let r = bfs(&g, a, Direction::Downstream, 3);
        assert_eq!(r.root_path(a), vec![a]);
    }
}
