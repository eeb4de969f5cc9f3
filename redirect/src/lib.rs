//! The Sink redirect core.
//!
//! Resolves short-link slugs from a key-value store and serves the response
//! best suited to the requesting client: crawlers get a static preview page,
//! mobile browsers get an app-open interstitial, the target app's own
//! webview gets bounced straight back, and everything else gets a plain
//! HTTP redirect. Each served request emits a fire-and-forget access event.

pub mod access_log;
pub mod apps;
pub mod config;
pub mod context;
pub mod device;
pub mod errors;
pub mod metrics_defs;
pub mod resolver;
pub mod response;
pub mod service;
pub mod strategy;

#[cfg(test)]
mod testutils;

pub use config::Config;
pub use errors::{RedirectError, Result};
pub use service::RedirectService;

use linkstore::analytics::{HttpSink, NoopSink};
use linkstore::{AnalyticsSink, LinkStore};
use shared::http::run_http_service;
use std::sync::Arc;

/// Serve the redirect core on the configured listener until the listener
/// fails. The store backend is deployment-specific and injected; the
/// analytics sink is built from configuration.
pub async fn run(config: Config, store: Arc<dyn LinkStore>) -> Result<()> {
    config.validate()?;

    let sink: Arc<dyn AnalyticsSink> = match &config.analytics {
        Some(analytics) => Arc::new(HttpSink::new(analytics.endpoint.clone())),
        None => Arc::new(NoopSink),
    };

    let service = RedirectService::new(&config, store, sink)?;
    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        "redirect core listening"
    );
    run_http_service(&config.listener.host, config.listener.port, service).await
}
