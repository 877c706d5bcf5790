//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return its render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "reelcraft_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "reelcraft_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "reelcraft_http_requests_in_flight";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "reelcraft_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

fn id_patterns() -> &'static [(regex_lite::Regex, &'static str); 2] {
    static PATTERNS: OnceLock<[(regex_lite::Regex, &'static str); 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                regex_lite::Regex::new(r"[0-9a-f]{8}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{12}")
                    .expect("valid uuid pattern"),
                ":id",
            ),
            (
                regex_lite::Regex::new(r"/[0-9]+(/|$)").expect("valid numeric pattern"),
                "/:id$1",
            ),
        ]
    })
}

/// Sanitize path for metrics labels (remove IDs).
fn sanitize_path(path: &str) -> String {
    let mut path = path.to_string();
    for (pattern, replacement) in id_patterns() {
        path = pattern.replace_all(&path, *replacement).into_owned();
    }
    path
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}
