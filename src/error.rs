use thiserror::Error;

/// Terminal failure of one analysis request.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("start node \"{0}\" not found")]
    StartNotFound(String),

    #[error("failed to read graph source: {0}")]
    Read(#[from] std::io::Error),

    #[error("run {run} was superseded by a newer request")]
    Superseded { run: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}
