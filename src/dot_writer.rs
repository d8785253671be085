use std::collections::BTreeMap;

use crate::graph::Graph;
use crate::subgraph::Subgraph;
use crate::traversal::{Algorithm, Direction};

const LEVEL_COLORS: [&str; 9] = [
    "red",
    "orange",
    "yellow",
    "lightgreen",
    "lightblue",
    "lightpink",
    "lavender",
    "lightcyan",
    "lightgray",
];

pub struct DotMeta<'a> {
    pub start: &'a str,
    pub direction: Direction,
    pub algorithm: Algorithm,
}

/// Subgraphs larger than this are not serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotLimits {
    pub max_nodes: usize,
    pub max_edges: usize,
}

impl Default for DotLimits {
    fn default() -> Self {
        Self {
            max_nodes: 6500,
            max_edges: 9000,
        }
    }
}

impl DotLimits {
    pub fn allows(&self, subgraph: &Subgraph) -> bool {
        subgraph.nodes.len() <= self.max_nodes && subgraph.edges.len() <= self.max_edges
    }
}

struct Wording {
    title: &'static str,
    marker: &'static str,
    extremal: &'static str,
    paths: &'static str,
}

fn wording(direction: Direction) -> Wording {
    match direction {
        Direction::Downstream => Wording {
            title: "Forward_Subgraph_Analysis_of_",
            marker: "[TERMINAL]",
            extremal: "Terminal nodes",
            paths: "Paths to terminal nodes",
        },
        Direction::Upstream => Wording {
            title: "Backward_Subgraph_Analysis_of_",
            marker: "[BASE]",
            extremal: "Base models",
            paths: "Paths to base models",
        },
    }
}

pub fn render(graph: &Graph, subgraph: &Subgraph, meta: &DotMeta<'_>) -> String {
    let words = wording(meta.direction);
    let algorithm = match meta.algorithm {
        Algorithm::Bfs => "BFS",
        Algorithm::Dfs => "DFS",
    };
    let mut out: Vec<String> = Vec::new();

    out.push(format!("digraph \"{}{}\" {{", words.title, sanitize(meta.start)));
    if meta.direction == Direction::Upstream {
        out.push("  rankdir=BT;".to_string());
    }
    out.push("  node [shape=box, style=filled];".to_string());
    out.push("  edge [color=blue];".to_string());
    out.push(String::new());

    out.push(format!("  // Algorithm: {algorithm}"));
    out.push(format!("  // Nodes visited: {}", subgraph.nodes.len()));
    out.push(format!("  // Edges found: {}", subgraph.edges.len()));
    out.push(format!("  // Maximum depth: {} levels", subgraph.max_level));
    if !subgraph.paths.is_empty() {
        let names: Vec<&str> = subgraph.paths.iter().map(|p| graph.id(p.node)).collect();
        out.push(format!("  // {}: {}", words.extremal, names.join(", ")));
    }
    out.push(String::new());

    if !subgraph.paths.is_empty() {
        out.push(format!("  // {}:", words.paths));
        for path in &subgraph.paths {
            let hops: Vec<&str> = path.path.iter().map(|&n| graph.id(n)).collect();
            out.push(format!(
                "  // {}: {} ({} steps)",
                graph.id(path.node),
                hops.join(" -> "),
                path.steps()
            ));
        }
        out.push(String::new());
    }

    let mut by_level: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for node in &subgraph.nodes {
        by_level.entry(node.level).or_default().push(quote(&node.id));
    }
    for members in by_level.values() {
        out.push(format!("  {{ rank=same; {}; }}", members.join("; ")));
    }
    out.push(String::new());

    for node in &subgraph.nodes {
        let color = LEVEL_COLORS[node.level % LEVEL_COLORS.len()];
        let mut label = format!("{}\\nLevel: {}", escape(&node.label), node.level);
        if let Some(steps) = node.steps.filter(|&s| s > 0) {
            label.push_str(&format!("\\nSteps: {steps}"));
        }
        let mut style = String::new();
        if node.is_extremal {
            label.push_str("\\n");
            label.push_str(words.marker);
            style.push_str(", style=\"filled,bold\", penwidth=3");
        }
        out.push(format!(
            "  {} [fillcolor={color}, label=\"{label}\"{style}];",
            quote(&node.id)
        ));
    }
    out.push(String::new());

    out.push("  // Edges with level and type".to_string());
    for edge in &subgraph.edges {
        let mut parts = vec![format!("L{}", edge.level)];
        parts.extend(edge.abbr.map(str::to_string));
        out.push(format!(
            "  {} -> {} [label=\"{}\"];",
            quote(&edge.from_id),
            quote(&edge.to_id),
            parts.join(" | ")
        ));
    }
    out.push("}".to_string());

    out.join("\n")
}

/// Graph-name form of an identifier: anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn escape(s: &str) -> String {
    s.replace('"', "\\\"")
}

fn quote(s: &str) -> String {
    format!("\"{}\"", escape(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot_parser::parse_dot;
    use crate::subgraph::{ExtractOptions, extract};
    use crate::traversal::traverse;
    use pretty_assertions::assert_eq;

    fn render_from(text: &str, start: &str, direction: Direction, depth: usize) -> String {
        let g = parse_dot(text);
        let record = traverse(&g, g.handle(start).unwrap(), direction, Algorithm::Bfs, depth);
        let sub = extract(&g, &record, ExtractOptions::default());
        render(
            &g,
            &sub,
            &DotMeta {
                start,
                direction,
                algorithm: Algorithm::Bfs,
            },
        )
    }

    #[test]
    fn sanitize_replaces_punctuation() {
        assert_eq!(sanitize("org/model 7b:v1.0"), "org_model_7b_v1.0");
    }

    #[test]
    fn quote_escapes_inner_quotes() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn downstream_chain() {
        let dot = render_from("A -> B\nB -> C\n", "A", Direction::Downstream, 5);
        let expected = r#"digraph "Forward_Subgraph_Analysis_of_A" {
  node [shape=box, style=filled];
  edge [color=blue];

  // Algorithm: BFS
  // Nodes visited: 3
  // Edges found: 2
  // Maximum depth: 2 levels
  // Terminal nodes: C

  // Paths to terminal nodes:
  // C: A -> B -> C (2 steps)

  { rank=same; "A"; }
  { rank=same; "B"; }
  { rank=same; "C"; }

  "A" [fillcolor=red, label="A\nLevel: 0"];
  "B" [fillcolor=orange, label="B\nLevel: 1"];
  "C" [fillcolor=yellow, label="C\nLevel: 2\nSteps: 2\n[TERMINAL]", style="filled,bold", penwidth=3];

  // Edges with level and type
  "A" -> "B" [label="L1 | FT"];
  "B" -> "C" [label="L2 | FT"];
}"#;
        assert_eq!(dot, expected);
    }

    #[test]
    fn upstream_flips_rank_direction() {
        let dot = render_from("base -> ft [label=\"sft\"]\n", "ft", Direction::Upstream, 5);
        assert!(dot.starts_with("digraph \"Backward_Subgraph_Analysis_of_ft\" {\n  rankdir=BT;"));
        assert!(dot.contains("// Base models: base"));
        assert!(dot.contains("[BASE]"));
        assert!(dot.contains("\"ft\" -> \"base\" [label=\"L1 | FT\"];"));
    }

    #[test]
    fn identifiers_with_quotes_are_escaped() {
        let dot = render_from("\"q\\\"uote\" -> b\n", "q\"uote", Direction::Downstream, 1);
        assert!(dot.starts_with("digraph \"Forward_Subgraph_Analysis_of_q_uote\" {"));
        assert!(
            dot.contains(r#""q\"uote" [fillcolor=red, label="q\"uote\nLevel: 0"];"#),
            "{dot}"
        );
        assert!(dot.contains(r#""q\"uote" -> "b" [label="L1 | FT"];"#));
    }

    #[test]
    fn limits() {
        let g = parse_dot("a -> b\n");
        let record = traverse(&g, g.handle("a").unwrap(), Direction::Downstream, Algorithm::Bfs, 5);
        let sub = extract(&g, &record, ExtractOptions::default());
        assert!(DotLimits::default().allows(&sub));
        assert!(!DotLimits { max_nodes: 1, max_edges: 10 }.allows(&sub));
        assert!(!DotLimits { max_nodes: 10, max_edges: 0 }.allows(&sub));
    }
}
