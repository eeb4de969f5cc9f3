//! Fire-and-forget access logging.
//!
//! Every redirect decision produces at most one access event. The event is
//! handed to the analytics sink on a detached task after the response is
//! already decided; sink failures are logged and counted but never surface
//! to the client.

use crate::context::GeoContext;
use crate::device::DeviceProfile;
use crate::metrics_defs::ACCESS_LOG_FAILURES;
use hyper::header::HeaderMap;
use linkstore::{AccessEvent, AnalyticsSink, Link};
use shared::counter;
use shared::http::header_str;
use std::sync::Arc;
use url::Url;

pub struct AccessLogger {
    sink: Arc<dyn AnalyticsSink>,
    disable_bot_access_log: bool,
}

impl AccessLogger {
    pub fn new(sink: Arc<dyn AnalyticsSink>, disable_bot_access_log: bool) -> Self {
        AccessLogger {
            sink,
            disable_bot_access_log,
        }
    }

    /// Build the event for one resolved request. Returns `None` when the
    /// request is suppressed (bot traffic with bot logging disabled).
    pub fn build_event(
        &self,
        link: &Link,
        target: &str,
        headers: &HeaderMap,
        geo: &GeoContext,
        device: &DeviceProfile,
    ) -> Option<AccessEvent> {
        if self.disable_bot_access_log && device.is_bot {
            return None;
        }

        Some(AccessEvent {
            slug: link.slug.clone(),
            url: target.to_string(),
            index: link.id.clone(),
            ua: header_str(headers, "user-agent").map(str::to_string),
            ip: client_ip(headers),
            referer: referer_host(headers),
            country: geo.country.clone(),
            region: geo.region.clone(),
            city: geo.city.clone(),
            timezone: geo.timezone.clone(),
            language: accept_language(headers),
            os: Some(device.os_name.clone()),
            browser: Some(device.browser_name.clone()),
            device: device.device_model.clone(),
            colo: geo.colo.clone(),
            latitude: geo.latitude,
            longitude: geo.longitude,
        })
    }

    /// Ship an event without blocking the response path.
    pub fn record(&self, event: AccessEvent) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let slug = event.slug.clone();
            if let Err(error) = sink.record(event).await {
                counter!(ACCESS_LOG_FAILURES).increment(1);
                tracing::warn!(slug = %slug, error = %error, "failed to record access event");
            }
        });
    }
}

/// Client IP in edge-header priority order.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(ip) = header_str(headers, "cf-connecting-ip") {
        return Some(ip.to_string());
    }
    if let Some(ip) = header_str(headers, "x-real-ip") {
        return Some(ip.to_string());
    }
    // First entry of a comma-separated forwarding chain
    header_str(headers, "x-forwarded-for")
        .and_then(|chain| chain.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// Referring site, reduced to its host.
fn referer_host(headers: &HeaderMap) -> Option<String> {
    let referer = header_str(headers, "referer")?;
    let url = Url::parse(referer).ok()?;
    url.host_str().map(str::to_string)
}

/// First language tag of the Accept-Language header, quality weights and
/// whitespace stripped.
fn accept_language(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "accept-language")
        .and_then(|value| value.split(',').next())
        .map(|tag| tag.split(';').next().unwrap_or(tag).trim().to_string())
        .filter(|tag| !tag.is_empty())
}
