//! Redirect response generation.
//!
//! Renders the selected strategy as an HTTP response: a plain redirect, the
//! crawler-safe preview page, or the smart-redirect interstitial whose
//! embedded script walks a fixed sequence: attempt the app, wait for a
//! visibility/blur signal or a timeout, fall back to the store listing or a
//! manual choice, and unconditionally force a browser redirect after an
//! ultimate timeout. Destination URLs and app metadata come from stored
//! links and are escaped for both markup and script contexts.

use crate::apps::AppConfig;
use crate::device::DeviceProfile;
use crate::errors::RedirectError;
use http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION, REFERRER_POLICY};
use http::{Response, StatusCode};
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::body::Bytes;
use linkstore::Link;
use serde::Serialize;

pub type ResponseBody = BoxBody<Bytes, RedirectError>;

/// Client-side timeouts, in milliseconds.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    /// Delay before the first app-open attempt.
    pub app_detection: u64,
    /// Delay before navigating to a custom scheme URL.
    pub attempt_delay: u64,
    /// How long to wait for a visibility/blur signal after an attempt.
    pub visibility_wait: u64,
    /// Delay before the fallback UI yields to a forced redirect.
    pub fallback: u64,
    /// Delay before redirecting non-app traffic.
    pub redirect: u64,
    /// Delay before breaking out of an in-app browser.
    pub in_app: u64,
    /// Unconditional forced-redirect safety net.
    pub ultimate: u64,
}

pub const TIMEOUTS: Timeouts = Timeouts {
    app_detection: 100,
    attempt_delay: 300,
    visibility_wait: 300,
    fallback: 1500,
    redirect: 250,
    in_app: 100,
    ultimate: 2000,
};

const INTERSTITIAL_CACHE: &str = "no-store";
const PREVIEW_CACHE: &str = "public, max-age=3600, s-maxage=7200";

/// Escape a string for HTML text and attribute contexts.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serialize a value as JSON safe for embedding inside a `<script>` block.
fn escape_script_json<T: Serialize>(value: &T) -> Result<String, RedirectError> {
    let json = serde_json::to_string(value)
        .map_err(|e| RedirectError::ResponseBuild(format!("script config: {e}")))?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
        .replace('\'', "\\u0027"))
}

fn full_body(body: String) -> ResponseBody {
    Full::new(Bytes::from(body)).map_err(|e| match e {}).boxed()
}

fn html_response(
    status: StatusCode,
    cache_control: &str,
    body: String,
) -> Result<Response<ResponseBody>, RedirectError> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .header(CACHE_CONTROL, cache_control)
        .header("x-content-type-options", "nosniff")
        .header(REFERRER_POLICY, "strict-origin-when-cross-origin")
        .body(full_body(body))
        .map_err(|e| RedirectError::ResponseBuild(e.to_string()))
}

/// Plain HTTP redirect with the given status.
pub fn redirect(
    target: &str,
    status: StatusCode,
) -> Result<Response<ResponseBody>, RedirectError> {
    Response::builder()
        .status(status)
        .header(LOCATION, target)
        .header(CACHE_CONTROL, INTERSTITIAL_CACHE)
        .body(full_body(String::new()))
        .map_err(|e| RedirectError::ResponseBuild(e.to_string()))
}

/// Crawler-safe preview page: social metadata plus a meta refresh, no
/// scripted app-open logic a crawler could follow into a loop.
pub fn bot_preview(
    target: &str,
    link: &Link,
    app: &AppConfig,
) -> Result<Response<ResponseBody>, RedirectError> {
    let app_name = app
        .display_name
        .as_deref()
        .unwrap_or(app.name.as_str());
    let title = link
        .title
        .clone()
        .unwrap_or_else(|| format!("Open in {app_name}"));
    let description = link
        .description
        .clone()
        .unwrap_or_else(|| "Click to open this content in our mobile app".to_string());

    let escaped_target = escape_html(target);
    let escaped_title = escape_html(&title);
    let escaped_description = escape_html(&description);

    let itunes_meta = match &app.ios_app_id {
        Some(id) => format!(
            "<meta name=\"apple-itunes-app\" content=\"app-id={}\">\n",
            escape_html(id)
        ),
        None => String::new(),
    };
    let image_meta = match &link.image {
        Some(image) => format!(
            "<meta property=\"og:image\" content=\"{}\">\n",
            escape_html(image)
        ),
        None => String::new(),
    };

    let body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<meta property="og:title" content="{escaped_title}">
<meta property="og:description" content="{escaped_description}">
<meta property="og:type" content="website">
<meta property="og:url" content="{escaped_target}">
{image_meta}<meta name="twitter:card" content="summary">
<meta name="twitter:title" content="{escaped_title}">
<meta name="twitter:description" content="{escaped_description}">
{itunes_meta}<title>{escaped_title}</title>
<meta http-equiv="refresh" content="0;url={escaped_target}">
</head>
<body>
<p>Redirecting&hellip; <a href="{escaped_target}">Click here if not redirected</a></p>
</body>
</html>"#
    );

    // Device-invariant body, safe to cache at the edge
    html_response(StatusCode::OK, PREVIEW_CACHE, body)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScriptDevice {
    is_ios: bool,
    is_android: bool,
    is_mobile: bool,
    is_in_app_browser: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScriptConfig<'a> {
    target: &'a str,
    url_path: &'a str,
    device: ScriptDevice,
    ios_scheme: &'a str,
    ios_universal_link: &'a str,
    ios_app_id: &'a str,
    android_scheme: &'a str,
    android_package: &'a str,
    timeouts: Timeouts,
}

/// The smart-redirect interstitial for mobile clients.
///
/// `url_path` is the original request path (with query), embedded into
/// universal/app links so the app can re-resolve the slug itself.
pub fn interstitial(
    target: &str,
    url_path: &str,
    app: &AppConfig,
    device: &DeviceProfile,
) -> Result<Response<ResponseBody>, RedirectError> {
    let config = ScriptConfig {
        target,
        url_path,
        device: ScriptDevice {
            is_ios: device.is_ios,
            is_android: device.is_android,
            is_mobile: device.is_mobile,
            is_in_app_browser: device.is_in_app_browser,
        },
        ios_scheme: app.ios_url_scheme.as_deref().unwrap_or(""),
        ios_universal_link: app.ios_universal_link.as_deref().unwrap_or(""),
        ios_app_id: app.ios_app_id.as_deref().unwrap_or(""),
        android_scheme: app.android_url_scheme.as_deref().unwrap_or(""),
        android_package: app.android_package_name.as_deref().unwrap_or(""),
        timeouts: TIMEOUTS,
    };
    let script_config = escape_script_json(&config)?;

    let escaped_target = escape_html(target);
    let ios_store_link = match (&app.ios_app_id, device.is_ios) {
        (Some(id), true) => format!(
            "<a href=\"https://apps.apple.com/app/id{}\">Get the app</a>\n",
            escape_html(id)
        ),
        _ => String::new(),
    };
    let android_store_link = match (&app.android_package_name, device.is_android) {
        (Some(package), true) => format!(
            "<a href=\"https://play.google.com/store/apps/details?id={}\">Get the app</a>\n",
            escape_html(package)
        ),
        _ => String::new(),
    };

    let body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>Redirecting&hellip;</title>
{styles}
</head>
<body>
<div class="container">
<h1 id="title">Redirecting&hellip;</h1>
<div class="spinner"></div>
<div class="status" id="status">Please wait while we redirect you</div>
<div class="fallback" id="fallback">
<p>Taking too long?</p>
<a href="{escaped_target}">Open in browser</a>
{ios_store_link}{android_store_link}</div>
</div>
{script}
</body>
</html>"#,
        styles = STYLES,
        script = redirect_script(&script_config),
    );

    // Body varies per device profile; keep it out of edge caches
    html_response(StatusCode::OK, INTERSTITIAL_CACHE, body)
}

const STYLES: &str = "<style>*{margin:0;padding:0;box-sizing:border-box}\
body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;\
background:linear-gradient(135deg,#667eea 0%,#764ba2 100%);color:#fff;min-height:100vh;\
display:flex;align-items:center;justify-content:center;padding:20px}\
.container{max-width:400px;text-align:center}\
.spinner{width:50px;height:50px;border:3px solid rgba(255,255,255,0.3);\
border-top:3px solid #fff;border-radius:50%;animation:spin 1s linear infinite;margin:20px auto}\
@keyframes spin{0%{transform:rotate(0deg)}100%{transform:rotate(360deg)}}\
h1{font-size:24px;margin-bottom:8px;font-weight:600}\
.status{font-size:14px;opacity:0.9;margin-bottom:20px}\
.fallback{margin-top:30px;padding:16px;background:rgba(255,255,255,0.1);\
border-radius:10px;display:none}\
.fallback a{color:#fff;text-decoration:none;font-weight:600;padding:10px 20px;\
background:rgba(255,255,255,0.2);border-radius:6px;display:inline-block;margin:4px;font-size:14px}\
</style>";

/// The client-side state sequence: attempt, wait for a signal or timeout,
/// fall back, and always force a redirect after the ultimate timeout.
fn redirect_script(script_config: &str) -> String {
    format!(
        r#"<script>
(function(){{
'use strict';
var CONFIG={script_config};
var redirected=false,attempted=false,timers=[];
function schedule(fn,ms){{timers.push(setTimeout(fn,ms))}}
function clearAll(){{timers.forEach(clearTimeout);timers=[]}}
function setStatus(title,status){{
  var t=document.getElementById('title'),s=document.getElementById('status');
  if(t)t.textContent=title;if(s)s.textContent=status;
}}
function go(){{
  if(redirected)return;
  redirected=true;clearAll();
  window.location.href=CONFIG.target;
}}
function showFallback(){{
  var el=document.getElementById('fallback');
  if(el&&!redirected)el.style.display='block';
}}
function openStore(){{
  if(CONFIG.device.isIos&&CONFIG.iosAppId){{
    setStatus('Opening App Store\u2026','The app is not installed');
    window.location.href='https://apps.apple.com/app/id'+CONFIG.iosAppId;
  }}else if(CONFIG.device.isAndroid&&CONFIG.androidPackage){{
    setStatus('Opening Play Store\u2026','The app is not installed');
    window.location.href='https://play.google.com/store/apps/details?id='+CONFIG.androidPackage;
  }}else{{
    go();
  }}
}}
function waitForSignal(){{
  var signalled=false;
  function onHidden(){{
    if(document.visibilityState==='hidden'){{signalled=true;setStatus('Success!','App opened');}}
  }}
  function onBlur(){{signalled=true;setStatus('Success!','App opened');}}
  document.addEventListener('visibilitychange',onHidden);
  window.addEventListener('blur',onBlur);
  schedule(function(){{
    document.removeEventListener('visibilitychange',onHidden);
    window.removeEventListener('blur',onBlur);
    if(signalled||redirected)return;
    if((CONFIG.device.isIos&&CONFIG.iosAppId)||(CONFIG.device.isAndroid&&CONFIG.androidPackage)){{
      openStore();
    }}else{{
      showFallback();
      schedule(go,CONFIG.timeouts.fallback);
    }}
  }},CONFIG.timeouts.visibilityWait+CONFIG.timeouts.fallback);
}}
function attemptIos(){{
  if(attempted||redirected)return;
  attempted=true;
  setStatus('Opening App\u2026','Launching iOS app');
  if(CONFIG.iosUniversalLink){{
    var universal=CONFIG.target.indexOf(CONFIG.iosUniversalLink)===0
      ?CONFIG.target
      :CONFIG.iosUniversalLink+CONFIG.urlPath;
    waitForSignal();
    window.location.href=universal;
    return;
  }}
  if(CONFIG.iosScheme){{
    waitForSignal();
    schedule(function(){{
      if(!redirected)window.location.href=CONFIG.iosScheme+'://open?url='+encodeURIComponent(CONFIG.target);
    }},CONFIG.timeouts.attemptDelay);
    return;
  }}
  go();
}}
function attemptAndroid(){{
  if(attempted||redirected)return;
  attempted=true;
  setStatus('Opening App\u2026','Launching Android app');
  if(!CONFIG.androidScheme||!CONFIG.androidPackage)return go();
  var intentUrl='intent://open?url='+encodeURIComponent(CONFIG.urlPath)
    +'#Intent;scheme='+CONFIG.androidScheme
    +';package='+CONFIG.androidPackage
    +';action=android.intent.action.VIEW'
    +';category=android.intent.category.BROWSABLE'
    +';end';
  waitForSignal();
  window.location.href=intentUrl;
}}
function breakOutOfInApp(){{
  setStatus('Opening in Browser\u2026','Redirecting to external browser');
  schedule(function(){{
    if(redirected)return;
    var a=document.createElement('a');
    a.href=CONFIG.target;a.target='_blank';a.rel='noopener noreferrer';
    document.body.appendChild(a);a.click();document.body.removeChild(a);
    schedule(go,CONFIG.timeouts.redirect);
  }},CONFIG.timeouts.inApp);
}}
function init(){{
  if(CONFIG.device.isInAppBrowser){{
    breakOutOfInApp();
  }}else if(CONFIG.device.isIos){{
    schedule(attemptIos,CONFIG.timeouts.appDetection);
  }}else if(CONFIG.device.isAndroid){{
    schedule(attemptAndroid,CONFIG.timeouts.appDetection);
  }}else{{
    setStatus('Redirecting\u2026','Taking you to your destination');
    schedule(go,CONFIG.timeouts.redirect);
  }}
  setTimeout(go,CONFIG.timeouts.ultimate);
}}
if(document.readyState==='loading'){{
  document.addEventListener('DOMContentLoaded',init);
}}else{{init();}}
}})();
</script>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::{AppRegistry, Environment};
    use crate::config::AppsSection;
    use crate::device::DeviceClassifier;
    use crate::testutils::{ANDROID_CHROME_UA, body_string};

    fn youtube_config() -> AppConfig {
        let registry = AppRegistry::new(&AppsSection::default());
        registry.resolve("youtube", Environment::Production).clone()
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<img src="x" onerror='y'>&"#),
            "&lt;img src=&quot;x&quot; onerror=&#x27;y&#x27;&gt;&amp;"
        );
    }

    #[test]
    fn test_redirect_sets_location_and_status() {
        let response = redirect("https://sink.cool/", StatusCode::PERMANENT_REDIRECT).unwrap();
        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "https://sink.cool/"
        );
    }

    #[tokio::test]
    async fn test_bot_preview_contains_metadata_not_script() {
        let link = Link::new("bot-test", "https://example.com/page");
        let response = bot_preview("https://example.com/page", &link, &youtube_config()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            PREVIEW_CACHE
        );

        let body = body_string(response).await;
        assert!(body.contains(r#"<meta property="og:title""#));
        assert!(body.contains(r#"<meta http-equiv="refresh" content="0;url=https://example.com/page">"#));
        assert!(!body.contains("<script>"));
    }

    #[tokio::test]
    async fn test_bot_preview_uses_link_metadata_and_escapes_it() {
        let mut link = Link::new("bot-test", "https://example.com/");
        link.title = Some("<b>Title</b>".into());
        let response = bot_preview("https://example.com/", &link, &youtube_config()).unwrap();
        let body = body_string(response).await;
        assert!(body.contains("&lt;b&gt;Title&lt;/b&gt;"));
        assert!(!body.contains("<b>Title</b>"));
    }

    #[tokio::test]
    async fn test_interstitial_android_intent_url() {
        let device = DeviceClassifier::new(16, vec![]).classify(ANDROID_CHROME_UA);
        let response = interstitial(
            "https://youtube.com/watch?v=abc123",
            "/yt1",
            &youtube_config(),
            &device,
        )
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            INTERSTITIAL_CACHE
        );

        let body = body_string(response).await;
        assert!(body.contains("com.google.android.youtube"));
        assert!(body.contains("intent://open"));
        assert!(body.contains("https://play.google.com/store/apps/details?id=com.google.android.youtube"));
        // Browser fallback to the original target
        assert!(body.contains(r#"<a href="https://youtube.com/watch?v=abc123">Open in browser</a>"#));
    }

    #[tokio::test]
    async fn test_interstitial_escapes_script_breakout() {
        let device = DeviceClassifier::new(16, vec![]).classify(ANDROID_CHROME_UA);
        let hostile = "https://example.com/</script><script>alert(1)</script>";
        let response = interstitial(hostile, "/x", &youtube_config(), &device).unwrap();
        let body = body_string(response).await;
        assert!(!body.contains("</script><script>alert(1)"));
        assert!(body.contains("\\u003c/script\\u003e"));
    }
}
