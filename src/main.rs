use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dotreach::config::DEFAULT_DEPTH;
use dotreach::edge_type::UnlabeledEdges;
use dotreach::pipeline::{Analyzer, Phase, PipelineEvent, Source};
use dotreach::subgraph::{EdgeMode, ExtremalPolicy};
use dotreach::{Algorithm, Analysis, AnalysisConfig, Direction, Request};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Dot,
    Json,
    Table,
}

#[derive(Parser)]
#[command(
    name = "dotreach",
    about = "Extract the reachable subgraph of a model lineage DOT file"
)]
struct Cli {
    /// Input DOT file ("-" or omitted reads stdin)
    file: Option<PathBuf>,

    /// Start node: identifier, label, or a fragment of either
    #[arg(long, short = 's')]
    start: String,

    #[arg(long, short = 'd', value_enum, default_value_t = Direction::Downstream)]
    direction: Direction,

    /// Defaults to DFS downstream and BFS upstream
    #[arg(long, short = 'a', value_enum)]
    algorithm: Option<Algorithm>,

    /// Hop limit, clamped to 1..=50
    #[arg(long, short = 'm', default_value_t = DEFAULT_DEPTH)]
    max_depth: usize,

    #[arg(long, short = 'f', value_enum, default_value_t = Format::Dot)]
    format: Format,

    /// JSON analysis config
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    unlabeled_edges: Option<UnlabeledEdges>,

    #[arg(long, value_enum)]
    extremal: Option<ExtremalPolicy>,

    #[arg(long, value_enum)]
    edge_mode: Option<EdgeMode>,

    /// -v for progress, -vv for debug output
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("ERROR: {message}");
    std::process::exit(1);
}

fn load_config(cli: &Cli) -> AnalysisConfig {
    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::load(path).unwrap_or_else(|e| fail(e)),
        None => AnalysisConfig::default(),
    };
    if let Some(policy) = cli.unlabeled_edges {
        config.unlabeled_edges = policy;
    }
    if let Some(policy) = cli.extremal {
        config.extremal = policy;
    }
    if let Some(mode) = cli.edge_mode {
        config.edge_mode = mode;
    }
    config
}

fn print_analysis(analysis: &Analysis, format: Format) {
    match format {
        Format::Dot => {
            if analysis.dot_truncated {
                fail(format!(
                    "subgraph too large to serialize ({} nodes, {} edges); use --format json or table",
                    analysis.subgraph.nodes.len(),
                    analysis.subgraph.edges.len()
                ));
            }
            println!("{}", analysis.dot);
        }
        Format::Json => match serde_json::to_string_pretty(analysis) {
            Ok(json) => println!("{json}"),
            Err(e) => fail(e),
        },
        Format::Table => println!("{}", dotreach::summary::render_table(analysis)),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli);
    let source = match &cli.file {
        Some(path) if path.as_os_str() != "-" => Source::Path(path.clone()),
        _ => Source::Stdin,
    };
    let mut request = Request::new(cli.start.clone(), cli.direction).with_max_depth(cli.max_depth);
    if let Some(algorithm) = cli.algorithm {
        request = request.with_algorithm(algorithm);
    }

    let (analyzer, mut events) = Analyzer::new(config);
    let _ = analyzer.submit(source, request);

    while let Some(event) = events.recv().await {
        let Some(event) = analyzer.tracker().accept(event) else {
            continue;
        };
        match event {
            PipelineEvent::Progress { phase, .. } => match phase {
                Phase::Fetch => info!("reading input"),
                Phase::Parse { lines } => info!(lines, "parsing"),
                Phase::Traverse { algorithm } => info!(?algorithm, "traversing"),
                Phase::Prepare => info!("preparing output"),
            },
            PipelineEvent::Finished { outcome, .. } => match outcome {
                Ok(analysis) => {
                    info!(
                        nodes = analysis.subgraph.nodes.len(),
                        edges = analysis.subgraph.edges.len(),
                        total_ms = analysis.stats.total_ms,
                        "analysis complete"
                    );
                    print_analysis(&analysis, cli.format);
                    return;
                }
                Err(e) => fail(e),
            },
        }
    }
    fail("analysis ended without a result");
}
