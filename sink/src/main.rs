mod config;

use clap::Parser;
use config::Config;
use linkstore::MemoryStore;
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Smart short-link redirect service.
#[derive(Parser)]
#[command(name = "sink")]
struct Cli {
    /// Path to the YAML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum SinkError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Redirect(#[from] redirect::RedirectError),

    #[error("could not install metrics recorder: {0}")]
    Metrics(String),
}

#[tokio::main]
async fn main() -> Result<(), SinkError> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let _sentry_guard = config.common.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.clone(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "loaded configuration");
    }

    if let Some(metrics) = &config.common.metrics {
        let recorder = StatsdBuilder::from(&metrics.statsd_host, metrics.statsd_port)
            .build(Some("sink"))
            .map_err(|e| SinkError::Metrics(e.to_string()))?;
        metrics::set_global_recorder(recorder).map_err(|e| SinkError::Metrics(e.to_string()))?;
    }

    // The KV store backend is deployment-specific; local runs get an
    // in-memory store seeded through the management API or tests.
    redirect::run(config.redirect, Arc::new(MemoryStore::new())).await?;
    Ok(())
}
