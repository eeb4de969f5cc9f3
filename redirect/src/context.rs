//! Edge-supplied request metadata.

use hyper::header::HeaderMap;
use shared::http::header_str;

/// Geo and bot-management metadata supplied by the edge network.
///
/// Every field is optional and untrusted; absence of the headers simply
/// leaves the fields unset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeoContext {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub colo: Option<String>,
    /// Bot-management verdict from the edge network; short-circuits to the
    /// bot-safe response path when set.
    pub verified_bot: bool,
}

impl GeoContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        GeoContext {
            country: header_str(headers, "cf-ipcountry").map(str::to_string),
            region: header_str(headers, "cf-region").map(str::to_string),
            city: header_str(headers, "cf-ipcity").map(str::to_string),
            timezone: header_str(headers, "cf-timezone").map(str::to_string),
            latitude: header_str(headers, "cf-iplatitude").and_then(|v| v.parse().ok()),
            longitude: header_str(headers, "cf-iplongitude").and_then(|v| v.parse().ok()),
            colo: header_str(headers, "cf-colo").map(str::to_string),
            verified_bot: header_str(headers, "cf-verified-bot") == Some("true"),
        }
    }
}
