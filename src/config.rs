use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dot_writer::DotLimits;
use crate::edge_type::UnlabeledEdges;
use crate::subgraph::{EdgeMode, ExtractOptions, ExtremalPolicy};
use crate::traversal::{Algorithm, Direction};

pub const MIN_DEPTH: usize = 1;
pub const MAX_DEPTH: usize = 50;
pub const DEFAULT_DEPTH: usize = 5;

/// Settings shared by every request an analyzer runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub unlabeled_edges: UnlabeledEdges,
    pub extremal: ExtremalPolicy,
    pub edge_mode: EdgeMode,
    /// Emit a parse progress event every this many lines; 0 disables.
    pub progress_every: usize,
    /// Bytes read from the source per chunk.
    pub chunk_size: usize,
    pub dot_max_nodes: usize,
    pub dot_max_edges: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let limits = DotLimits::default();
        Self {
            unlabeled_edges: UnlabeledEdges::default(),
            extremal: ExtremalPolicy::default(),
            edge_mode: EdgeMode::default(),
            progress_every: 4000,
            chunk_size: 8192,
            dot_max_nodes: limits.max_nodes,
            dot_max_edges: limits.max_edges,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AnalysisConfig {
    /// Loads a JSON config file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            extremal: self.extremal,
            edge_mode: self.edge_mode,
            unlabeled_edges: self.unlabeled_edges,
        }
    }

    pub fn dot_limits(&self) -> DotLimits {
        DotLimits {
            max_nodes: self.dot_max_nodes,
            max_edges: self.dot_max_edges,
        }
    }
}

/// One analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Identifier, label, or fragment of either.
    pub start: String,
    pub direction: Direction,
    pub algorithm: Algorithm,
    max_depth: usize,
}

impl Request {
    /// A request using the direction's default algorithm and depth 5.
    pub fn new(start: impl Into<String>, direction: Direction) -> Self {
        Self {
            start: start.into(),
            direction,
            algorithm: direction.default_algorithm(),
            max_depth: DEFAULT_DEPTH,
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the hop limit, clamped to `MIN_DEPTH..=MAX_DEPTH`.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.clamp(MIN_DEPTH, MAX_DEPTH);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}
