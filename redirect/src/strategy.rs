//! Redirect strategy selection.
//!
//! A fixed-order decision procedure over the device profile; the first
//! matching condition wins and every state is terminal. The bot check runs
//! first because crawler user-agents often carry mobile-looking tokens.

use crate::device::DeviceProfile;
use http::StatusCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Static metadata/preview page for crawlers; no scripted redirects.
    BotPreview,
    /// The request already comes from the target app's webview; plain 302.
    InAppRedirect,
    /// Client-side app-open attempt with browser fallback. Chosen for any
    /// mobile client, with or without platform config; the page degrades to
    /// a plain fallback link when no scheme is configured.
    Interstitial,
    /// Direct HTTP redirect with the configured status code.
    DirectRedirect(StatusCode),
}

impl Strategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Strategy::BotPreview => "bot_preview",
            Strategy::InAppRedirect => "in_app_redirect",
            Strategy::Interstitial => "interstitial",
            Strategy::DirectRedirect(_) => "direct_redirect",
        }
    }
}

/// Pick the response strategy for a classified request.
///
/// `verified_bot` is the edge network's own bot-management verdict and is
/// honored even when the user-agent passes the signature list.
pub fn select(device: &DeviceProfile, verified_bot: bool, redirect_status: StatusCode) -> Strategy {
    if device.is_bot || verified_bot {
        return Strategy::BotPreview;
    }
    if device.is_in_app {
        return Strategy::InAppRedirect;
    }
    if device.is_mobile {
        return Strategy::Interstitial;
    }
    Strategy::DirectRedirect(redirect_status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceClassifier;
    use crate::testutils::{
        ANDROID_CHROME_UA, DESKTOP_CHROME_UA, GOOGLEBOT_UA, IPHONE_SAFARI_UA,
    };

    fn classify(ua: &str) -> DeviceProfile {
        DeviceClassifier::new(16, vec!["safeyou".into()]).classify(ua)
    }

    #[test]
    fn test_bot_precedes_mobile() {
        // Googlebot's smartphone UA carries Android and Mobile tokens
        let device = classify(GOOGLEBOT_UA);
        assert!(device.is_mobile);
        assert_eq!(
            select(&device, false, StatusCode::PERMANENT_REDIRECT),
            Strategy::BotPreview
        );
    }

    #[test]
    fn test_verified_bot_signal_forces_bot_path() {
        let device = classify(DESKTOP_CHROME_UA);
        assert_eq!(
            select(&device, true, StatusCode::PERMANENT_REDIRECT),
            Strategy::BotPreview
        );
    }

    #[test]
    fn test_in_app_precedes_interstitial() {
        let device = classify("Mozilla/5.0 (iPhone; like Mac OS X) SafeYou/2.1 Mobile");
        assert!(device.is_mobile);
        assert_eq!(
            select(&device, false, StatusCode::PERMANENT_REDIRECT),
            Strategy::InAppRedirect
        );
    }

    #[test]
    fn test_mobile_gets_interstitial() {
        for ua in [ANDROID_CHROME_UA, IPHONE_SAFARI_UA] {
            assert_eq!(
                select(&classify(ua), false, StatusCode::PERMANENT_REDIRECT),
                Strategy::Interstitial
            );
        }
    }

    #[test]
    fn test_desktop_gets_configured_status() {
        let device = classify(DESKTOP_CHROME_UA);
        assert_eq!(
            select(&device, false, StatusCode::MOVED_PERMANENTLY),
            Strategy::DirectRedirect(StatusCode::MOVED_PERMANENTLY)
        );
    }
}
