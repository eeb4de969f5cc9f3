use crate::apps::AppEnvironments;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Invalid slug pattern: {0}")]
    InvalidSlugPattern(String),

    #[error("Redirect status code must be a redirect code, got {0}")]
    InvalidRedirectStatus(u16),

    #[error("Link cache TTL cannot be 0")]
    InvalidCacheTtl,
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Cache sizing and lifetime knobs.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Read-through TTL for resolved link records, in seconds.
    pub link_ttl_secs: u64,
    /// Maximum resolved link records held.
    pub link_capacity: u64,
    /// User-agent memoization entries held before a full flush.
    pub ua_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            link_ttl_secs: 60,
            link_capacity: 10_000,
            ua_capacity: 1_000,
        }
    }
}

/// App-target detection configuration.
///
/// The built-in app tables can be extended (or individual entries replaced)
/// per deployment; `default_app` is the fallback when no detection rule
/// matches.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppsSection {
    pub default_app: Option<String>,
    /// Additional app configurations, keyed by app id.
    pub apps: HashMap<String, AppEnvironments>,
    /// Additional host-to-app rules, evaluated before the built-in table.
    pub hosts: Vec<HostRule>,
    /// Additional destination-URL rules, evaluated before the built-in table.
    pub url_patterns: Vec<HostRule>,
}

/// Maps a host/URL substring to an app id.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct HostRule {
    pub pattern: String,
    pub app: String,
}

/// Analytics collector endpoint; events are logged locally when absent.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AnalyticsConfig {
    pub endpoint: String,
}

/// Redirect service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    /// Pattern a path segment must match to be treated as a slug.
    #[serde(default = "default_slug_regex")]
    pub slug_regex: String,
    /// Path segments never treated as slugs.
    #[serde(default = "default_reserved_slugs")]
    pub reserved_slugs: Vec<String>,
    /// When false (the default), slugs are stored and looked up lowercased,
    /// with an original-case fallback for legacy mixed-case records.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Status code for direct (desktop) redirects. 308 unless overridden;
    /// deployments following the original service typically set 301.
    #[serde(default = "default_redirect_status")]
    pub redirect_status_code: u16,
    /// Where to send requests for the bare root path.
    #[serde(default)]
    pub home_url: Option<Url>,
    /// Skip access-log writes for requests classified as bots.
    #[serde(default)]
    pub disable_bot_access_log: bool,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub apps: AppsSection,
    #[serde(default)]
    pub analytics: Option<AnalyticsConfig>,
}

fn default_slug_regex() -> String {
    r"(?i)^[a-z0-9]+(?:-[a-z0-9]+)*$".to_string()
}

fn default_reserved_slugs() -> Vec<String> {
    vec!["dashboard".to_string(), "api".to_string()]
}

fn default_redirect_status() -> u16 {
    308
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listener: Listener::default(),
            slug_regex: default_slug_regex(),
            reserved_slugs: default_reserved_slugs(),
            case_sensitive: false,
            redirect_status_code: default_redirect_status(),
            home_url: None,
            disable_bot_access_log: false,
            cache: CacheConfig::default(),
            apps: AppsSection::default(),
            analytics: None,
        }
    }
}

impl Config {
    /// Validates the redirect service configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if let Err(e) = regex::Regex::new(&self.slug_regex) {
            return Err(ValidationError::InvalidSlugPattern(e.to_string()));
        }

        if !matches!(self.redirect_status_code, 301 | 302 | 303 | 307 | 308) {
            return Err(ValidationError::InvalidRedirectStatus(
                self.redirect_status_code,
            ));
        }

        if self.cache.link_ttl_secs == 0 {
            return Err(ValidationError::InvalidCacheTtl);
        }

        Ok(())
    }
}
