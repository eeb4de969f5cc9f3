//! User-agent classification.
//!
//! Profiles are a pure function of the raw user-agent string and are memoized
//! by exact string match. The memo cache is bounded: when it reaches capacity
//! it is cleared wholesale before the next insert. A full flush (rather than
//! LRU eviction) keeps the structure trivial while still capping growth under
//! adversarial user-agent variation.

use crate::metrics_defs::UA_CACHE_FLUSHES;
use shared::counter;
use std::collections::HashMap;
use std::sync::Mutex;

/// Known bot/crawler/fetcher signatures, matched case-insensitively.
const BOT_TOKENS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "crawling",
    "facebookexternalhit",
    "twitterbot",
    "linkedinbot",
    "whatsapp",
    "telegrambot",
    "googlebot",
    "bingbot",
    "slackbot",
    "discordbot",
    "skypebot",
];

/// Embedded webviews of social/messaging apps.
const IN_APP_BROWSER_TOKENS: &[&str] = &[
    "fban",
    "fbav",
    "instagram",
    "line",
    "kakaotalk",
    "twitter",
    "pinterest",
    "snapchat",
    "tiktok",
    "whatsapp",
    "linkedin",
    "messenger",
    "wechat",
    "telegram",
    "discord",
    "slack",
];

const IOS_TOKENS: &[&str] = &["ipad", "iphone", "ipod"];
const MOBILE_TOKENS: &[&str] = &["ipad", "iphone", "ipod", "android", "mobile", "tablet"];

/// Browser identity tokens, most specific first.
const BROWSER_TOKENS: &[(&str, &str)] = &[
    ("edg/", "Edge"),
    ("opr/", "Opera"),
    ("firefox/", "Firefox"),
    ("chrome/", "Chrome"),
    ("crios/", "Chrome"),
    ("safari/", "Safari"),
];

/// Classification result for one user-agent string. Never mutated after
/// creation.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceProfile {
    pub is_ios: bool,
    pub is_android: bool,
    pub is_mobile: bool,
    pub is_in_app_browser: bool,
    pub is_bot: bool,
    /// The request already comes from the first-party app's own webview;
    /// app-open logic is bypassed entirely.
    pub is_in_app: bool,
    pub browser_name: String,
    pub os_name: String,
    pub os_version: Option<String>,
    pub device_model: Option<String>,
}

/// Classifies user-agent strings with a bounded memoization cache.
///
/// Owns its cache explicitly so tests can construct isolated instances; safe
/// for concurrent use from multiple in-flight requests.
pub struct DeviceClassifier {
    cache: Mutex<HashMap<String, DeviceProfile>>,
    capacity: usize,
    /// Signatures of the first-party application's own webview.
    first_party_tokens: Vec<String>,
}

impl DeviceClassifier {
    pub fn new(capacity: usize, first_party_tokens: Vec<String>) -> Self {
        DeviceClassifier {
            cache: Mutex::new(HashMap::new()),
            capacity,
            first_party_tokens: first_party_tokens
                .into_iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn classify(&self, user_agent: &str) -> DeviceProfile {
        let mut cache = self.cache.lock().expect("ua cache mutex poisoned");
        if let Some(profile) = cache.get(user_agent) {
            return profile.clone();
        }

        if cache.len() >= self.capacity {
            // Full flush; no stale entry may ever be returned, and LRU
            // bookkeeping is not worth it for this cache.
            cache.clear();
            counter!(UA_CACHE_FLUSHES).increment(1);
        }

        let profile = self.parse(user_agent);
        cache.insert(user_agent.to_string(), profile.clone());
        profile
    }

    fn parse(&self, user_agent: &str) -> DeviceProfile {
        let ua = user_agent.to_ascii_lowercase();

        let is_bot = BOT_TOKENS.iter().any(|t| ua.contains(t));
        let is_ios = IOS_TOKENS.iter().any(|t| ua.contains(t));
        let is_android = ua.contains("android");
        let is_mobile = is_ios || is_android || MOBILE_TOKENS.iter().any(|t| ua.contains(t));
        let is_in_app_browser = IN_APP_BROWSER_TOKENS.iter().any(|t| ua.contains(t))
            || self.first_party_tokens.iter().any(|t| ua.contains(t));
        let is_in_app = self.first_party_tokens.iter().any(|t| ua.contains(t));

        DeviceProfile {
            is_ios,
            is_android,
            is_mobile,
            is_in_app_browser,
            is_bot,
            is_in_app,
            browser_name: browser_name(&ua),
            os_name: os_name(&ua),
            os_version: os_version(&ua),
            device_model: device_model(&ua),
        }
    }

    #[cfg(test)]
    pub(crate) fn cached_entries(&self) -> usize {
        self.cache.lock().expect("ua cache mutex poisoned").len()
    }
}

fn browser_name(ua: &str) -> String {
    BROWSER_TOKENS
        .iter()
        .find(|(token, _)| ua.contains(token))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn os_name(ua: &str) -> String {
    if IOS_TOKENS.iter().any(|t| ua.contains(t)) {
        "iOS"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("windows") {
        "Windows"
    } else if ua.contains("mac os") || ua.contains("macintosh") {
        "macOS"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "Unknown"
    }
    .to_string()
}

/// Extract the OS version token following a known marker, e.g.
/// "android 13" or "iphone os 16_5".
fn os_version(ua: &str) -> Option<String> {
    for marker in ["iphone os ", "cpu os ", "android "] {
        if let Some(rest) = ua.split(marker).nth(1) {
            let version: String = rest
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '_')
                .collect();
            if !version.is_empty() {
                return Some(version.replace('_', "."));
            }
        }
    }
    None
}

/// Android UAs carry the model between the last "; " and " build/".
fn device_model(ua: &str) -> Option<String> {
    if ua.contains("iphone") {
        return Some("iPhone".to_string());
    }
    if ua.contains("ipad") {
        return Some("iPad".to_string());
    }
    let build_at = ua.find(" build/")?;
    let model_start = ua[..build_at].rfind("; ")? + 2;
    let model = ua[model_start..build_at].trim();
    if model.is_empty() {
        None
    } else {
        Some(model.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{
        ANDROID_CHROME_UA, DESKTOP_CHROME_UA, GOOGLEBOT_UA, IPHONE_SAFARI_UA, MESSENGER_IOS_UA,
    };

    fn classifier() -> DeviceClassifier {
        DeviceClassifier::new(1000, vec!["SafeYou".into(), "fambox".into()])
    }

    #[test]
    fn test_desktop_chrome() {
        let profile = classifier().classify(DESKTOP_CHROME_UA);
        assert!(!profile.is_mobile);
        assert!(!profile.is_bot);
        assert!(!profile.is_in_app_browser);
        assert_eq!(profile.browser_name, "Chrome");
        assert_eq!(profile.os_name, "Windows");
    }

    #[test]
    fn test_android_chrome() {
        let profile = classifier().classify(ANDROID_CHROME_UA);
        assert!(profile.is_android);
        assert!(profile.is_mobile);
        assert!(!profile.is_ios);
        assert!(!profile.is_in_app_browser);
        assert_eq!(profile.os_name, "Android");
        assert_eq!(profile.os_version.as_deref(), Some("13"));
        assert_eq!(profile.device_model.as_deref(), Some("pixel 7"));
    }

    #[test]
    fn test_iphone_safari() {
        let profile = classifier().classify(IPHONE_SAFARI_UA);
        assert!(profile.is_ios);
        assert!(profile.is_mobile);
        assert_eq!(profile.os_name, "iOS");
        assert_eq!(profile.os_version.as_deref(), Some("16.5"));
        assert_eq!(profile.device_model.as_deref(), Some("iPhone"));
    }

    #[test]
    fn test_bot_wins_over_mobile_tokens() {
        // Googlebot's smartphone UA carries Android tokens
        let profile = classifier().classify(GOOGLEBOT_UA);
        assert!(profile.is_bot);
    }

    #[test]
    fn test_in_app_browser() {
        let profile = classifier().classify(MESSENGER_IOS_UA);
        assert!(profile.is_in_app_browser);
        assert!(!profile.is_in_app);
    }

    #[test]
    fn test_first_party_app_webview() {
        let profile = classifier().classify("Mozilla/5.0 (iPhone) SafeYou/2.1");
        assert!(profile.is_in_app);
        assert!(profile.is_in_app_browser);
    }

    #[test]
    fn test_memoization_is_idempotent() {
        let classifier = classifier();
        let first = classifier.classify(ANDROID_CHROME_UA);
        let second = classifier.classify(ANDROID_CHROME_UA);
        assert_eq!(first, second);
        assert_eq!(classifier.cached_entries(), 1);
    }

    #[test]
    fn test_cache_flushes_at_capacity() {
        let classifier = DeviceClassifier::new(3, vec![]);
        for i in 0..3 {
            classifier.classify(&format!("agent-{i}"));
        }
        assert_eq!(classifier.cached_entries(), 3);

        // The insert that would exceed capacity clears everything first
        let before_flush = classifier.classify("agent-0");
        classifier.classify("agent-3");
        assert_eq!(classifier.cached_entries(), 1);

        // Flushing changes cost, never results
        assert_eq!(classifier.classify("agent-0"), before_flush);
    }
}
