use tracing::debug;

use crate::error::AnalysisError;
use crate::graph::{Graph, NodeHandle};

/// Resolves a user query to a start node. Tried in order: exact identifier,
/// exact label, case-insensitive identifier then label, case-insensitive
/// prefix of identifier then label, case-insensitive substring of
/// identifier then label. The first node in handle order wins at each step.
///
/// Every edge endpoint is registered on first mention, so a query naming a
/// declared edge target is already covered by the exact identifier rule.
pub fn resolve_start(graph: &Graph, query: &str) -> Result<NodeHandle, AnalysisError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AnalysisError::StartNotFound(query.to_string()));
    }
    if let Some(handle) = graph.handle(query) {
        return Ok(handle);
    }
    if let Some(handle) = graph.handles().find(|&h| graph.label(h) == Some(query)) {
        debug!(query, id = graph.id(handle), "start resolved by label");
        return Ok(handle);
    }

    let needle = query.to_lowercase();
    let rules: [fn(&str, &str) -> bool; 3] = [
        |candidate, needle| candidate == needle,
        |candidate, needle| candidate.starts_with(needle),
        |candidate, needle| candidate.contains(needle),
    ];
    for rule in rules {
        let by_id = graph
            .handles()
            .find(|&h| rule(&graph.id(h).to_lowercase(), &needle));
        let by_label = || {
            graph.handles().find(|&h| {
                graph
                    .label(h)
                    .is_some_and(|l| rule(&l.to_lowercase(), &needle))
            })
        };
        if let Some(handle) = by_id.or_else(by_label) {
            debug!(query, id = graph.id(handle), "start resolved by fuzzy match");
            return Ok(handle);
        }
    }

    Err(AnalysisError::StartNotFound(query.to_string()))
}
