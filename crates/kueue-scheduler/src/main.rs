//! `kueue-scheduler run --config <path>`: a thin CLI that wires a
//! [`Cache`], a chosen object-store collaborator, and a fixed set of
//! framework adapters together and starts the scheduling loop. Does not
//! stand up an HTTP server — metrics are exposed via the `prometheus`
//! registry returned by [`kueue_scheduler::Metrics::new`] for the
//! deployment to scrape however it sees fit.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kueue_core::Cache;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;

use kueue_scheduler::{testing::FakeObjectStore, Metrics, SchedulerConfig};

#[derive(Parser)]
#[command(name = "kueue-scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Starts the scheduler loop.
    Run {
        #[arg(long, env = "KUEUE_SCHEDULER_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .compact()
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let Command::Run { config } = cli.command;
    let config = match config {
        Some(path) => match SchedulerConfig::from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(error = %err, "failed to load scheduler config, exiting");
                std::process::exit(1);
            }
        },
        None => SchedulerConfig::default().apply_env_overrides(),
    };

    let cache = Cache::new(config.feature_gates);
    let metrics = match Metrics::new() {
        Ok(metrics) => metrics,
        Err(err) => {
            tracing::error!(error = %err, "failed to register metrics, exiting");
            std::process::exit(1);
        }
    };

    // No real cluster wired up here; a deployment supplies its own
    // `ObjectStoreCollaborator` and registers real `FrameworkAdapter`s in
    // its place (`spec.md` §9's adapter registry).
    let store = FakeObjectStore::default();
    let cancel = CancellationToken::new();

    let run_cancel = cancel.clone();
    let loop_handle = tokio::spawn(async move {
        kueue_scheduler::run(&cache, &config, &store, &metrics, run_cancel).await;
    });

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    cancel.cancel();
    let _ = loop_handle.await;
}
