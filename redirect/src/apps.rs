//! App-target detection.
//!
//! Maps a resolved link (and the host serving it) to the mobile application
//! that owns the destination, then to that application's per-environment
//! deep-link configuration. Detection precedence is fixed: an explicit
//! per-link app field wins over destination-URL patterns, which win over
//! host patterns; a configured default app is the final fallback. The
//! registry is built at startup from the built-in tables plus configuration
//! overrides and remains immutable during request processing.

use crate::config::AppsSection;
use indexmap::IndexMap;
use linkstore::Link;
use serde::Deserialize;
use std::collections::HashMap;

/// Deployment environment, derived from the serving host.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Development,
}

impl Environment {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
        }
    }
}

/// Deep-link configuration for one app in one environment.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub ios_app_id: Option<String>,
    #[serde(default)]
    pub ios_url_scheme: Option<String>,
    #[serde(default)]
    pub ios_universal_link: Option<String>,
    #[serde(default)]
    pub android_package_name: Option<String>,
    #[serde(default)]
    pub android_app_name: Option<String>,
    #[serde(default)]
    pub android_url_scheme: Option<String>,
    #[serde(default)]
    pub android_host: Option<String>,
    pub web_url: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub theme_color: Option<String>,
}

impl AppConfig {
    /// An app config is actionable when at least one platform has both an
    /// identity and a way to open it.
    pub fn has_platform_config(&self) -> bool {
        let ios = self.ios_app_id.is_some()
            && (self.ios_url_scheme.is_some() || self.ios_universal_link.is_some());
        let android = self.android_package_name.is_some() && self.android_url_scheme.is_some();
        ios || android
    }
}

/// Per-environment configurations for one app id.
///
/// Production is mandatory; staging/development fall back to it when absent.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppEnvironments {
    pub production: AppConfig,
    #[serde(default)]
    pub staging: Option<AppConfig>,
    #[serde(default)]
    pub development: Option<AppConfig>,
}

impl AppEnvironments {
    fn for_environment(&self, environment: Environment) -> &AppConfig {
        match environment {
            Environment::Production => &self.production,
            Environment::Staging => self.staging.as_ref().unwrap_or(&self.production),
            Environment::Development => self.development.as_ref().unwrap_or(&self.production),
        }
    }
}

/// Outcome of app-target detection; always present, never partial.
#[derive(Clone, Copy, Debug)]
pub struct Detection<'a> {
    pub app_id: &'a str,
    pub environment: Environment,
    pub config: &'a AppConfig,
}

/// The app table with its detection rules.
pub struct AppRegistry {
    apps: IndexMap<String, AppEnvironments>,
    /// Ordered (substring, app id) rules against the destination URL.
    url_patterns: Vec<(String, String)>,
    /// Ordered (substring, app id) rules against the serving host.
    host_rules: Vec<(String, String)>,
    /// App-specific (host substring, environment) rules, tried before the
    /// generic host heuristics.
    environment_rules: HashMap<String, Vec<(String, Environment)>>,
    /// UA signatures of each app's own webview.
    detection_tokens: HashMap<String, Vec<String>>,
    default_app: String,
    placeholder: AppEnvironments,
}

impl AppRegistry {
    /// Build the registry from the built-in tables merged with configured
    /// additions. Configured entries take precedence over built-ins of the
    /// same app id, and configured rules are tried first.
    pub fn new(section: &AppsSection) -> Self {
        let mut registry = builtin_registry();

        for (app_id, environments) in &section.apps {
            registry.apps.insert(app_id.clone(), environments.clone());
        }
        for rule in section.url_patterns.iter().rev() {
            registry
                .url_patterns
                .insert(0, (rule.pattern.to_lowercase(), rule.app.clone()));
        }
        for rule in section.hosts.iter().rev() {
            registry
                .host_rules
                .insert(0, (rule.pattern.to_lowercase(), rule.app.clone()));
        }
        if let Some(default_app) = &section.default_app {
            registry.default_app = default_app.clone();
        }

        registry
    }

    /// Resolve the app owning `link`'s destination, as served from
    /// `request_host`. Total: always yields some configuration.
    pub fn detect(&self, link: &Link, request_host: &str) -> Detection<'_> {
        let app_id = self.detect_app_id(link, request_host);
        let environment = self.environment_for_host(request_host, app_id);
        let config = self.resolve(app_id, environment);
        Detection {
            app_id,
            environment,
            config,
        }
    }

    fn detect_app_id(&self, link: &Link, request_host: &str) -> &str {
        // Explicit per-link override, only honored for known app ids
        if let Some(app) = &link.app
            && let Some((known, _)) = self.apps.get_key_value(app.as_str())
        {
            return known;
        }

        let url = link.url.to_lowercase();
        for (pattern, app_id) in &self.url_patterns {
            if url.contains(pattern) {
                return app_id;
            }
        }

        let host = request_host.to_lowercase();
        for (pattern, app_id) in &self.host_rules {
            if host.contains(pattern) {
                return app_id;
            }
        }

        &self.default_app
    }

    /// Derive the environment from the serving host. App-specific rules are
    /// consulted first when present; otherwise generic host heuristics apply.
    pub fn environment_for_host(&self, host: &str, app_id: &str) -> Environment {
        let host = host.to_lowercase();

        if let Some(rules) = self.environment_rules.get(app_id) {
            for (pattern, environment) in rules {
                if host.contains(pattern) {
                    return *environment;
                }
            }
        }

        if host.contains("localhost") || host.contains("127.0.0.1") || host.contains(".local") {
            return Environment::Development;
        }
        if host.contains("staging") || host.contains("qa") || host.contains("test") {
            return Environment::Staging;
        }
        if host.contains("dev") {
            return Environment::Development;
        }

        Environment::Production
    }

    /// Look up the config for `(app_id, environment)`, falling back to the
    /// app's production entry for missing environments and to the placeholder
    /// for unknown app ids.
    pub fn resolve(&self, app_id: &str, environment: Environment) -> &AppConfig {
        match self.apps.get(app_id) {
            Some(environments) => environments.for_environment(environment),
            None => {
                tracing::warn!(app_id, "unknown app id, using placeholder config");
                self.placeholder.for_environment(environment)
            }
        }
    }

    /// UA signatures of the default app's own webview, for the classifier.
    pub fn first_party_tokens(&self) -> Vec<String> {
        self.detection_tokens
            .get(&self.default_app)
            .cloned()
            .unwrap_or_default()
    }
}

fn app(name: &str, web_url: &str) -> AppConfig {
    AppConfig {
        ios_app_id: None,
        ios_url_scheme: None,
        ios_universal_link: None,
        android_package_name: None,
        android_app_name: None,
        android_url_scheme: None,
        android_host: None,
        web_url: web_url.to_string(),
        name: name.to_string(),
        display_name: None,
        logo: None,
        theme_color: None,
    }
}

fn safeyou_env(scheme_suffix: &str, web_url: &str, name: &str, theme: &str) -> AppConfig {
    AppConfig {
        ios_app_id: Some("1491665304".into()),
        ios_url_scheme: Some(format!("com.eif.safeyou{scheme_suffix}")),
        ios_universal_link: Some("https://safeyou.page.link".into()),
        android_package_name: Some("fambox.pro".into()),
        android_app_name: Some("Safe YOU".into()),
        android_url_scheme: Some("https".into()),
        android_host: Some("safeyou.page.link".into()),
        display_name: Some("SafeYou".into()),
        logo: Some("SY".into()),
        theme_color: Some(theme.into()),
        ..app(name, web_url)
    }
}

fn builtin_registry() -> AppRegistry {
    let mut apps = IndexMap::new();

    apps.insert(
        "safeyou".to_string(),
        AppEnvironments {
            production: safeyou_env("", "https://safeyou.space", "Safe YOU", "#6b46c1"),
            staging: Some(safeyou_env(
                ".qa",
                "https://qa.safeyou.space",
                "Safe YOU (Staging)",
                "#dc2626",
            )),
            development: Some(safeyou_env(
                ".dev",
                "https://dev.safeyou.space",
                "Safe YOU (Dev)",
                "#059669",
            )),
        },
    );
    apps.insert(
        "youtube".to_string(),
        AppEnvironments {
            production: AppConfig {
                ios_app_id: Some("544007664".into()),
                ios_url_scheme: Some("youtube".into()),
                ios_universal_link: Some("https://www.youtube.com".into()),
                android_package_name: Some("com.google.android.youtube".into()),
                android_app_name: Some("YouTube".into()),
                android_url_scheme: Some("https".into()),
                android_host: Some("www.youtube.com".into()),
                display_name: Some("YouTube".into()),
                theme_color: Some("#ff0000".into()),
                ..app("YouTube", "https://www.youtube.com")
            },
            staging: None,
            development: None,
        },
    );
    apps.insert(
        "facebook".to_string(),
        AppEnvironments {
            production: AppConfig {
                ios_app_id: Some("284882215".into()),
                ios_url_scheme: Some("fb".into()),
                ios_universal_link: Some("https://www.facebook.com".into()),
                android_package_name: Some("com.facebook.katana".into()),
                android_app_name: Some("Facebook".into()),
                android_url_scheme: Some("https".into()),
                android_host: Some("www.facebook.com".into()),
                display_name: Some("Facebook".into()),
                theme_color: Some("#1877f2".into()),
                ..app("Facebook", "https://www.facebook.com")
            },
            staging: None,
            development: None,
        },
    );
    apps.insert(
        "whatsapp".to_string(),
        AppEnvironments {
            production: AppConfig {
                ios_app_id: Some("310633997".into()),
                ios_url_scheme: Some("whatsapp".into()),
                android_package_name: Some("com.whatsapp".into()),
                android_app_name: Some("WhatsApp".into()),
                android_url_scheme: Some("whatsapp".into()),
                display_name: Some("WhatsApp".into()),
                theme_color: Some("#25d366".into()),
                ..app("WhatsApp", "https://web.whatsapp.com")
            },
            staging: None,
            development: None,
        },
    );
    apps.insert(
        "spotify".to_string(),
        AppEnvironments {
            production: AppConfig {
                ios_app_id: Some("324684580".into()),
                ios_url_scheme: Some("spotify".into()),
                android_package_name: Some("com.spotify.music".into()),
                android_app_name: Some("Spotify".into()),
                android_url_scheme: Some("spotify".into()),
                display_name: Some("Spotify".into()),
                theme_color: Some("#1db954".into()),
                ..app("Spotify", "https://open.spotify.com")
            },
            staging: None,
            development: None,
        },
    );

    let url_patterns = [
        ("youtube.com/", "youtube"),
        ("youtu.be/", "youtube"),
        ("facebook.com/", "facebook"),
        ("fb.me/", "facebook"),
        ("wa.me/", "whatsapp"),
        ("api.whatsapp.com/", "whatsapp"),
        ("web.whatsapp.com/", "whatsapp"),
        ("chat.whatsapp.com/", "whatsapp"),
        ("open.spotify.com/", "spotify"),
        ("spotify.com/", "spotify"),
        ("safeyou.space/", "safeyou"),
        ("safeyou.page.link/", "safeyou"),
        ("fambox.pro", "safeyou"),
    ]
    .into_iter()
    .map(|(pattern, app)| (pattern.to_string(), app.to_string()))
    .collect();

    let host_rules = [
        ("safeyou.space", "safeyou"),
        ("safeyou.page.link", "safeyou"),
        ("web.whatsapp.com", "whatsapp"),
        ("wa.me", "whatsapp"),
        ("open.spotify.com", "spotify"),
        ("spotify.link", "spotify"),
        ("youtube.com", "youtube"),
        ("youtu.be", "youtube"),
        ("whatsapp", "whatsapp"),
        ("spotify", "spotify"),
        ("youtube", "youtube"),
        ("facebook", "facebook"),
        ("safeyou", "safeyou"),
        ("page.link", "safeyou"),
    ]
    .into_iter()
    .map(|(pattern, app)| (pattern.to_string(), app.to_string()))
    .collect();

    let environment_rules = HashMap::from([(
        "safeyou".to_string(),
        vec![
            ("dev.safeyou.space".to_string(), Environment::Development),
            ("qa.safeyou.space".to_string(), Environment::Staging),
            ("safeyou.space".to_string(), Environment::Production),
        ],
    )]);

    let detection_tokens = HashMap::from([
        (
            "safeyou".to_string(),
            vec!["safeyou".to_string(), "fambox".to_string()],
        ),
        ("whatsapp".to_string(), vec!["whatsapp".to_string()]),
        ("spotify".to_string(), vec!["spotify".to_string()]),
        (
            "youtube".to_string(),
            vec!["youtube".to_string(), "youtubemobile".to_string()],
        ),
    ]);

    AppRegistry {
        apps,
        url_patterns,
        host_rules,
        environment_rules,
        detection_tokens,
        default_app: "safeyou".to_string(),
        placeholder: AppEnvironments {
            production: AppConfig {
                theme_color: Some("#6b46c1".into()),
                ..app("Default App", "https://example.com")
            },
            staging: None,
            development: None,
        },
    }
}
