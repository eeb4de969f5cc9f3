//! The redirect decision pipeline.
//!
//! One request flows through: slug validation, store resolution, device
//! classification, the view-limit guard, query merging, app-target
//! detection, strategy selection, and response generation, with an access
//! event shipped on a detached task. Internal failures degrade instead of
//! surfacing: a broken store reads as not-found and a failed strategy
//! render falls back to a direct redirect to the already-known target.

use crate::access_log::AccessLogger;
use crate::apps::AppRegistry;
use crate::config::Config;
use crate::context::GeoContext;
use crate::device::DeviceClassifier;
use crate::errors::RedirectError;
use crate::metrics_defs::{REDIRECTS_SERVED, REQUEST_DURATION, VIEW_LIMIT_REJECTS};
use crate::resolver::{SlugResolver, merge_query};
use crate::response::{self, ResponseBody};
use crate::strategy::{self, Strategy};
use http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper::service::Service;
use linkstore::{AnalyticsSink, Link, LinkStore, views_key};
use shared::http::{header_str, make_error_response};
use shared::{counter, histogram};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

struct Inner {
    resolver: SlugResolver,
    classifier: DeviceClassifier,
    apps: AppRegistry,
    logger: AccessLogger,
    store: Arc<dyn LinkStore>,
    redirect_status: StatusCode,
    home_url: Option<Url>,
}

#[derive(Clone)]
pub struct RedirectService {
    inner: Arc<Inner>,
}

impl RedirectService {
    pub fn new(
        config: &Config,
        store: Arc<dyn LinkStore>,
        sink: Arc<dyn AnalyticsSink>,
    ) -> Result<Self, RedirectError> {
        config.validate()?;
        let apps = AppRegistry::new(&config.apps);
        let classifier = DeviceClassifier::new(config.cache.ua_capacity, apps.first_party_tokens());
        let resolver = SlugResolver::new(Arc::clone(&store), config)?;
        let logger = AccessLogger::new(sink, config.disable_bot_access_log);
        let redirect_status = StatusCode::from_u16(config.redirect_status_code)
            .map_err(|e| RedirectError::ResponseBuild(e.to_string()))?;

        Ok(RedirectService {
            inner: Arc::new(Inner {
                resolver,
                classifier,
                apps,
                logger,
                store,
                redirect_status,
                home_url: config.home_url.clone(),
            }),
        })
    }

    /// Decide and render the response for one request. Infallible by
    /// construction: anything that cannot be served degrades to an error
    /// status rather than propagating.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<ResponseBody> {
        let start = Instant::now();
        let inner = &self.inner;
        let (parts, _body) = request.into_parts();

        let path = parts.uri.path();
        if path == "/" {
            return match &inner.home_url {
                Some(home) => response::redirect(home.as_str(), inner.redirect_status)
                    .unwrap_or_else(|_| make_error_response(StatusCode::NOT_FOUND)),
                None => make_error_response(StatusCode::NOT_FOUND),
            };
        }

        let slug = path.trim_start_matches('/');
        let Some(link) = inner.resolver.resolve(slug).await else {
            return make_error_response(StatusCode::NOT_FOUND);
        };

        let user_agent = header_str(&parts.headers, "user-agent").unwrap_or_default();
        let device = inner.classifier.classify(user_agent);
        let geo = GeoContext::from_headers(&parts.headers);

        if !device.is_bot {
            if let Some(rejection) = self.enforce_view_limit(&link).await {
                return rejection;
            }
        }

        let target = merge_query(&link.url, parts.uri.query());
        let request_host = header_str(&parts.headers, "host").unwrap_or("localhost");
        let detection = inner.apps.detect(&link, request_host);
        let strategy = strategy::select(&device, geo.verified_bot, inner.redirect_status);

        tracing::debug!(
            slug = %link.slug,
            app = detection.app_id,
            environment = detection.environment.as_str(),
            strategy = strategy.as_str(),
            "redirect decision"
        );

        let url_path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or(path);
        let rendered = match strategy {
            Strategy::BotPreview => response::bot_preview(&target, &link, detection.config),
            Strategy::InAppRedirect => response::redirect(&target, StatusCode::FOUND),
            Strategy::Interstitial => {
                response::interstitial(&target, url_path, detection.config, &device)
            }
            Strategy::DirectRedirect(status) => response::redirect(&target, status),
        };
        let response = rendered.unwrap_or_else(|error| {
            // The target is known, so a render failure still redirects
            tracing::warn!(slug = %link.slug, strategy = strategy.as_str(), %error,
                "strategy render failed, downgrading to direct redirect");
            response::redirect(&target, inner.redirect_status)
                .unwrap_or_else(|_| make_error_response(StatusCode::BAD_GATEWAY))
        });

        if let Some(event) = inner
            .logger
            .build_event(&link, &target, &parts.headers, &geo, &device)
        {
            inner.logger.record(event);
        }

        counter!(REDIRECTS_SERVED, "strategy" => strategy.as_str()).increment(1);
        histogram!(REQUEST_DURATION, "strategy" => strategy.as_str())
            .record(start.elapsed().as_secs_f64());

        response
    }

    /// Best-effort view ceiling. Counter reads and increments are not
    /// coordinated, so concurrent requests may overshoot by a few views;
    /// a failing counter backend never blocks the redirect.
    async fn enforce_view_limit(&self, link: &Link) -> Option<Response<ResponseBody>> {
        let max_views = link.max_views?;
        let key = views_key(&link.slug);

        match self.inner.store.get_counter(&key).await {
            Ok(views) if views >= max_views => {
                counter!(VIEW_LIMIT_REJECTS).increment(1);
                tracing::info!(slug = %link.slug, views, max_views, "view limit reached");
                Some(make_error_response(StatusCode::TOO_MANY_REQUESTS))
            }
            Ok(_) => {
                if let Err(error) = self.inner.store.incr_counter(&key).await {
                    tracing::warn!(slug = %link.slug, %error, "view counter increment failed");
                }
                None
            }
            Err(error) => {
                tracing::warn!(slug = %link.slug, %error, "view counter read failed, skipping guard");
                None
            }
        }
    }
}

impl Service<Request<Incoming>> for RedirectService {
    type Response = Response<ResponseBody>;
    type Error = RedirectError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, request: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(request).await) })
    }
}
