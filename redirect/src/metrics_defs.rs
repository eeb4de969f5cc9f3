use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "redirect.request.duration",
    metric_type: MetricType::Histogram,
    description: "Redirect request duration in seconds. Tagged with strategy.",
};

pub const REDIRECTS_SERVED: MetricDef = MetricDef {
    name: "redirect.served",
    metric_type: MetricType::Counter,
    description: "Responses served by the redirect core. Tagged with strategy.",
};

pub const STORE_ERRORS_MASKED: MetricDef = MetricDef {
    name: "redirect.store_errors_masked",
    metric_type: MetricType::Counter,
    description: "Link store errors masked as not-found",
};

pub const VIEW_LIMIT_REJECTS: MetricDef = MetricDef {
    name: "redirect.view_limit_rejects",
    metric_type: MetricType::Counter,
    description: "Requests rejected because a link reached its view ceiling",
};

pub const ACCESS_LOG_FAILURES: MetricDef = MetricDef {
    name: "redirect.access_log_failures",
    metric_type: MetricType::Counter,
    description: "Access-log writes that failed and were discarded",
};

pub const UA_CACHE_FLUSHES: MetricDef = MetricDef {
    name: "redirect.ua_cache_flushes",
    metric_type: MetricType::Counter,
    description: "Full flushes of the user-agent memoization cache",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REDIRECTS_SERVED,
    STORE_ERRORS_MASKED,
    VIEW_LIMIT_REJECTS,
    ACCESS_LOG_FAILURES,
    UA_CACHE_FLUSHES,
];
