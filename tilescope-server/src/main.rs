//! Tilescope server - camera-driven tile subset streaming.
//!
//! Binds the HTTP/WebSocket surface on the configured port, serving
//! camera-state requests against a source tile archive and an
//! optional ingested feature corpus.
//!
//! # Configuration
//!
//! The source archive resolves from `--source`, then the
//! `PMTILES_SOURCE_PATH` environment variable, then the default
//! candidate paths. Startup fails with exit code 1 when no archive
//! path resolves.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tilescope::config::{resolve_source_path, Settings, DEFAULT_LISTEN_PORT};
use tilescope::service::{serve, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tilescope-server")]
#[command(version = tilescope::VERSION)]
#[command(about = "Camera-driven vector tile subset streaming server", long_about = None)]
struct Cli {
    /// Source tile archive (default: PMTILES_SOURCE_PATH or the
    /// bundled asset candidates)
    #[arg(long)]
    source: Option<PathBuf>,

    /// Feature datasets (GeoJSON) to ingest into the spatial index
    #[arg(long = "dataset")]
    datasets: Vec<PathBuf>,

    /// Target planar CRS for the feature corpus
    #[arg(long, default_value = "EPSG:3857")]
    target_crs: String,

    /// Listen port
    #[arg(long, default_value_t = DEFAULT_LISTEN_PORT)]
    port: u16,

    /// Startup thread count (0 = hardware concurrency)
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let source_path = match resolve_source_path(cli.source.as_deref()) {
        Some(path) => path,
        None => {
            tracing::error!("no tile archive path resolves; set PMTILES_SOURCE_PATH or --source");
            return ExitCode::from(1);
        }
    };

    let settings = Settings {
        source_path: Some(source_path),
        datasets: cli.datasets,
        target_crs: cli.target_crs,
        listen_port: cli.port,
        threads: cli.threads,
    };

    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server terminated");
            ExitCode::from(1)
        }
    }
}

#[tokio::main]
async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(version = tilescope::VERSION, "tilescope starting");

    let state = AppState::build(&settings);
    serve(state, settings.listen_port)
        .await
        .context("serving failed")
}
