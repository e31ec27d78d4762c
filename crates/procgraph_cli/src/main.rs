// SPDX-License-Identifier: MIT OR Apache-2.0
//! `procgraph` - evaluate a procedural graph document from the command line.
//!
//! Usage: `procgraph <graph.json> [--settings <file.ron>] [--watch]`
//!
//! Loads the document, recomputes it and prints the value of every output
//! node. With `--watch` the document is reloaded each time it changes.

mod settings;
mod watch;

use procgraph_graph::{DocumentError, Graph, GraphContext};
use settings::CliSettings;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use watch::GraphWatcher;

/// Errors that end the program
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error("Could not read settings: {0}")]
    Settings(#[from] std::io::Error),

    #[error("Could not load graph: {0}")]
    Document(#[from] DocumentError),

    #[error("Could not watch graph: {0}")]
    Watch(#[from] notify_debouncer_full::notify::Error),
}

const USAGE: &str = "usage: procgraph <graph.json> [--settings <file.ron>] [--watch]";

/// Parsed command line
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    graph: PathBuf,
    settings: Option<PathBuf>,
    watch: bool,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, CliError> {
        let mut graph = None;
        let mut parsed = Args::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--watch" | "-w" => parsed.watch = true,
                "--settings" | "-s" => {
                    let path = args
                        .next()
                        .ok_or_else(|| CliError::Usage("--settings needs a path".into()))?;
                    parsed.settings = Some(path.into());
                }
                "--help" | "-h" => return Err(CliError::Usage(USAGE.into())),
                flag if flag.starts_with('-') => {
                    return Err(CliError::Usage(format!("unknown flag {flag}\n{USAGE}")));
                }
                path if graph.is_none() => graph = Some(PathBuf::from(path)),
                extra => {
                    return Err(CliError::Usage(format!("unexpected argument {extra}\n{USAGE}")));
                }
            }
        }

        parsed.graph = graph.ok_or_else(|| CliError::Usage(USAGE.into()))?;
        Ok(parsed)
    }
}

fn main() {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    let settings = match CliSettings::resolve(args.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", CliError::from(e));
            std::process::exit(1);
        }
    };

    init_tracing(&settings);
    tracing::info!("Starting procgraph v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, &settings) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn init_tracing(settings: &CliSettings) {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    match settings.log_filter.parse() {
        Ok(directive) => env_filter = env_filter.add_directive(directive),
        Err(e) => eprintln!("ignoring log filter {:?}: {e}", settings.log_filter),
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(args: &Args, settings: &CliSettings) -> Result<(), CliError> {
    if !args.watch {
        return evaluate(args, settings);
    }

    let watcher = GraphWatcher::new(
        &args.graph,
        Duration::from_millis(settings.watch_debounce_ms),
    )?;
    if let Err(e) = evaluate(args, settings) {
        tracing::error!("{e}");
    }
    while watcher.wait_for_change() {
        tracing::info!(path = %watcher.path().display(), "graph changed, reloading");
        if let Err(e) = evaluate(args, settings) {
            tracing::error!("{e}");
        }
    }
    Ok(())
}

fn evaluate(args: &Args, settings: &CliSettings) -> Result<(), CliError> {
    let mut graph = Graph::load(&args.graph, GraphContext::default())?;
    tracing::debug!(
        name = %graph.name,
        nodes = graph.node_count(),
        "graph loaded"
    );

    if let Some((width, height)) = settings.target_size() {
        graph.resize_with(width, height);
    }

    for id in graph.output_node_ids() {
        let name = graph.node(id).map_or("", |n| n.name.as_str());
        if settings.print_values {
            let value = graph.output_value(id).unwrap_or_default();
            println!("{id} ({name}): {}", value.to_json());
        }
        if settings.compile_outputs {
            match graph.compile_program(id) {
                Some(program) => println!("{program}"),
                None => tracing::warn!(node = %id, "output has no emittable shader"),
            }
        }
    }

    graph.dispose();
    Ok(())
}
