pub mod config;
pub mod dot_parser;
pub mod dot_writer;
pub mod edge_type;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod resolve;
pub mod subgraph;
pub mod summary;
pub mod traversal;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

pub use config::{AnalysisConfig, Request};
pub use error::AnalysisError;
pub use graph::{Graph, NodeHandle};
pub use subgraph::Subgraph;
pub use traversal::{Algorithm, Direction};

use crate::dot_writer::DotMeta;
use crate::pipeline::Phase;

/// Result of one analysis request.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub start: String,
    pub direction: Direction,
    pub algorithm: Algorithm,
    pub max_depth: usize,
    #[serde(flatten)]
    pub subgraph: Subgraph,
    /// Empty when `dot_truncated` is set.
    pub dot: String,
    pub dot_truncated: bool,
    /// Identifier to label, for nodes that declared one.
    pub labels: BTreeMap<String, String>,
    pub raw_line_count: usize,
    pub stats: Stats,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Stats {
    pub parse_ms: f64,
    pub traverse_ms: f64,
    pub total_ms: f64,
}

fn millis(d: Duration) -> f64 {
    (d.as_secs_f64() * 10_000.0).round() / 10.0
}

/// Runs a whole request over in-memory DOT text.
pub fn analyze(text: &str, request: &Request, config: &AnalysisConfig) -> Result<Analysis, AnalysisError> {
    let started = Instant::now();
    let mut builder = dot_parser::GraphBuilder::new();
    for line in text.lines() {
        builder.push_line(line);
    }
    let lines = builder.line_count();
    let graph = builder.finish();
    run_stages(&graph, lines, request, config, started, &mut |_| Ok(()))
}

/// Resolve, traverse, extract and serialize over a built graph.
/// `checkpoint` runs before the traverse and prepare phases and may abort
/// the request.
pub(crate) fn run_stages(
    graph: &Graph,
    raw_line_count: usize,
    request: &Request,
    config: &AnalysisConfig,
    started: Instant,
    checkpoint: &mut dyn FnMut(Phase) -> Result<(), AnalysisError>,
) -> Result<Analysis, AnalysisError> {
    let parse_elapsed = started.elapsed();

    checkpoint(Phase::Traverse {
        algorithm: request.algorithm,
    })?;
    let start = resolve::resolve_start(graph, &request.start)?;
    let traverse_started = Instant::now();
    let record = traversal::traverse(
        graph,
        start,
        request.direction,
        request.algorithm,
        request.max_depth(),
    );
    let traverse_elapsed = traverse_started.elapsed();
    info!(
        start = graph.id(start),
        visited = record.order.len(),
        hops = record.edges.len(),
        "traversal complete"
    );

    let subgraph = subgraph::extract(graph, &record, config.extract_options());

    checkpoint(Phase::Prepare)?;
    let limits = config.dot_limits();
    let dot_truncated = !limits.allows(&subgraph);
    let dot = if dot_truncated {
        warn!(
            nodes = subgraph.nodes.len(),
            edges = subgraph.edges.len(),
            "subgraph exceeds DOT limits; skipping serialization"
        );
        String::new()
    } else {
        dot_writer::render(
            graph,
            &subgraph,
            &DotMeta {
                start: graph.id(start),
                direction: request.direction,
                algorithm: request.algorithm,
            },
        )
    };

    let labels = graph
        .label_table()
        .map(|(id, label)| (id.to_string(), label.to_string()))
        .collect();
    debug!(dot_bytes = dot.len(), "analysis prepared");

    Ok(Analysis {
        start: graph.id(start).to_string(),
        direction: request.direction,
        algorithm: request.algorithm,
        max_depth: request.max_depth(),
        subgraph,
        dot,
        dot_truncated,
        labels,
        raw_line_count,
        stats: Stats {
            parse_ms: millis(parse_elapsed),
            traverse_ms: millis(traverse_elapsed),
            total_ms: millis(started.elapsed()),
        },
    })
}
