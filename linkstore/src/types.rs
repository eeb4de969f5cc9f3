use serde::{Deserialize, Serialize};

/// Key namespace prefix for link records.
pub const LINK_PREFIX: &str = "link:";
/// Key namespace prefix for per-link view counters.
pub const VIEWS_PREFIX: &str = "views:";

/// Store key for the link record of `slug`.
pub fn link_key(slug: &str) -> String {
    format!("{LINK_PREFIX}{slug}")
}

/// Store key for the view counter of `slug`.
pub fn views_key(slug: &str) -> String {
    format!("{VIEWS_PREFIX}{slug}")
}

/// A stored short link.
///
/// Created by the link-management API (out of scope here); the redirect core
/// treats records as read-only. Unknown fields are rejected rather than
/// silently carried along.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Link {
    #[serde(default)]
    pub id: Option<String>,
    pub slug: String,
    pub url: String,
    /// Epoch seconds after which the record is unreachable. Enforced by the
    /// store on read, not by the redirect core.
    #[serde(default)]
    pub expiration: Option<u64>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Explicit app-ownership override; takes precedence over URL and host
    /// detection.
    #[serde(default)]
    pub app: Option<String>,
    /// Best-effort view ceiling; once reached, non-bot requests receive 429.
    #[serde(default)]
    pub max_views: Option<u64>,
    #[serde(default)]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Link {
    /// Minimal record with only the identity fields set.
    pub fn new(slug: impl Into<String>, url: impl Into<String>) -> Self {
        Link {
            id: None,
            slug: slug.into(),
            url: url.into(),
            expiration: None,
            comment: None,
            app: None,
            max_views: None,
            created_at: None,
            updated_at: None,
            title: None,
            description: None,
            image: None,
        }
    }
}
