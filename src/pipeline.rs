//! Asynchronous request pipeline: fetch, parse, traverse, prepare.
//!
//! Every submitted request gets a [`RunToken`] carrying a monotonically
//! increasing run id. The pipeline checks its token at stage boundaries and
//! stops with [`AnalysisError::Superseded`] once a newer request exists;
//! consumers pass events through [`RunTracker::accept`] so only the newest
//! run's events are seen.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, Request};
use crate::dot_parser::{GraphBuilder, LineSplitter};
use crate::error::AnalysisError;
use crate::traversal::Algorithm;
use crate::{Analysis, run_stages};

pub type RunId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    Parse { lines: usize },
    Traverse { algorithm: Algorithm },
    Prepare,
}

#[derive(Debug)]
pub enum PipelineEvent {
    Progress { run: RunId, phase: Phase },
    /// Always the last event of a run.
    Finished {
        run: RunId,
        outcome: Result<Box<Analysis>, AnalysisError>,
    },
}

impl PipelineEvent {
    pub fn run(&self) -> RunId {
        match self {
            PipelineEvent::Progress { run, .. } | PipelineEvent::Finished { run, .. } => *run,
        }
    }
}

/// Issues run tokens and filters out events from superseded runs.
#[derive(Debug, Clone, Default)]
pub struct RunTracker {
    latest: Arc<AtomicU64>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> RunToken {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken {
            id,
            latest: Arc::clone(&self.latest),
        }
    }

    pub fn latest(&self) -> RunId {
        self.latest.load(Ordering::SeqCst)
    }

    /// Passes the event through only if it belongs to the newest run.
    pub fn accept(&self, event: PipelineEvent) -> Option<PipelineEvent> {
        let latest = self.latest();
        if event.run() == latest {
            Some(event)
        } else {
            debug!(run = event.run(), latest, "discarding event from stale run");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunToken {
    id: RunId,
    latest: Arc<AtomicU64>,
}

impl RunToken {
    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.id
    }

    fn check(&self) -> Result<(), AnalysisError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(AnalysisError::Superseded { run: self.id })
        }
    }
}

/// Where the DOT text comes from. Opening happens inside the fetch phase,
/// so failures surface as that run's terminal error.
pub enum Source {
    Path(PathBuf),
    Stdin,
    Reader(Box<dyn AsyncRead + Unpin + Send>),
}

impl Source {
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Source::Reader(Box::new(std::io::Cursor::new(bytes.into())))
    }

    async fn open(self) -> Result<Box<dyn AsyncRead + Unpin + Send>, AnalysisError> {
        let reader: Box<dyn AsyncRead + Unpin + Send> = match self {
            Source::Path(path) => Box::new(tokio::fs::File::open(&path).await?),
            Source::Stdin => Box::new(tokio::io::stdin()),
            Source::Reader(reader) => reader,
        };
        Ok(reader)
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Source::Stdin => f.write_str("Stdin"),
            Source::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// Submits requests and delivers their events on one channel.
#[derive(Debug)]
pub struct Analyzer {
    config: Arc<AnalysisConfig>,
    tracker: RunTracker,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let analyzer = Self {
            config: Arc::new(config),
            tracker: RunTracker::new(),
            events,
        };
        (analyzer, rx)
    }

    pub fn tracker(&self) -> &RunTracker {
        &self.tracker
    }

    /// Starts a new run, superseding any run still in flight.
    pub fn submit(&self, source: Source, request: Request) -> (RunId, JoinHandle<()>) {
        let token = self.tracker.issue();
        let id = token.id();
        info!(run = id, start = %request.start, "submitting analysis");
        let events = self.events.clone();
        let task = tokio::spawn(run(source, request, Arc::clone(&self.config), token, events.clone()));
        // A run that panics never sends its own `Finished`.
        let handle = tokio::spawn(async move {
            if let Err(err) = task.await {
                warn!(run = id, error = %err, "run aborted");
                let _ = events.send(PipelineEvent::Finished {
                    run: id,
                    outcome: Err(AnalysisError::Internal(err.to_string())),
                });
            }
        });
        (id, handle)
    }
}

/// Runs one request to completion, sending progress and a final
/// [`PipelineEvent::Finished`].
pub async fn run(
    source: Source,
    request: Request,
    config: Arc<AnalysisConfig>,
    token: RunToken,
    events: mpsc::UnboundedSender<PipelineEvent>,
) {
    let run = token.id();
    let outcome = execute(source, request, config, &token, &events).await;
    if let Err(err) = &outcome {
        debug!(run, error = %err, "run failed");
    }
    // The receiver may already be gone; nobody is left to tell.
    let _ = events.send(PipelineEvent::Finished {
        run,
        outcome: outcome.map(Box::new),
    });
}

async fn execute(
    source: Source,
    request: Request,
    config: Arc<AnalysisConfig>,
    token: &RunToken,
    events: &mpsc::UnboundedSender<PipelineEvent>,
) -> Result<Analysis, AnalysisError> {
    let run = token.id();
    let notify = move |phase: Phase| {
        let _ = events.send(PipelineEvent::Progress { run, phase });
    };
    let started = Instant::now();

    notify(Phase::Fetch);
    let mut reader = source.open().await?;

    let mut builder = GraphBuilder::new();
    let mut splitter = LineSplitter::new();
    let mut chunk = vec![0u8; config.chunk_size.max(1)];
    let every = config.progress_every;
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        splitter.feed(&chunk[..n], |line| {
            builder.push_line(line);
            let lines = builder.line_count();
            if every > 0 && lines % every == 0 {
                notify(Phase::Parse { lines });
            }
        });
        tokio::task::yield_now().await;
    }
    splitter.finish(|line| builder.push_line(line));
    let lines = builder.line_count();
    if lines == 0 || every == 0 || lines % every != 0 {
        notify(Phase::Parse { lines });
    }
    let graph = builder.finish();
    info!(run, lines, nodes = graph.len(), "parse complete");

    let token = token.clone();
    let events = events.clone();
    tokio::task::spawn_blocking(move || {
        run_stages(&graph, lines, &request, &config, started, &mut |phase| {
            token.check()?;
            let _ = events.send(PipelineEvent::Progress { run, phase });
            Ok(())
        })
    })
    .await
    .map_err(|e| AnalysisError::Internal(e.to_string()))?
}
