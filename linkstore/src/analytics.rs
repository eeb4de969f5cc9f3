//! The analytics sink interface.
//!
//! Access events are write-only and at-most-once-attempted: the redirect
//! core hands an event off and never waits for, nor observes, the outcome.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("HTTP sink error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink rejected event: status {0}")]
    Rejected(http::StatusCode),
}

/// One access-log event, derived from a resolved link plus request metadata.
///
/// All fields beyond the slug/url identity are optional and untrusted; geo
/// fields come from edge-network request metadata when present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub slug: String,
    pub url: String,
    /// Index key for the analytics backend, the link id when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, event: AccessEvent) -> Result<(), SinkError>;
}

/// Sink that POSTs events as JSON to a collector endpoint.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(endpoint: String) -> Self {
        HttpSink {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl AnalyticsSink for HttpSink {
    async fn record(&self, event: AccessEvent) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&event)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(status));
        }
        Ok(())
    }
}

/// Sink that logs events instead of shipping them; the development default.
pub struct NoopSink;

#[async_trait]
impl AnalyticsSink for NoopSink {
    async fn record(&self, event: AccessEvent) -> Result<(), SinkError> {
        tracing::debug!(slug = %event.slug, url = %event.url, "access event (noop sink)");
        Ok(())
    }
}

/// Sink that retains events in memory, for tests.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<AccessEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AccessEvent> {
        self.events.lock().expect("sink mutex poisoned").clone()
    }
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    async fn record(&self, event: AccessEvent) -> Result<(), SinkError> {
        self.events.lock().expect("sink mutex poisoned").push(event);
        Ok(())
    }
}
