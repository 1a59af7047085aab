use std::time::Instant;

use axum::{
    body::Body, extract::MatchedPath, http::Request, middleware::Next, response::IntoResponse,
    routing::get, Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const HTTP_REQUESTS_DURATION: &str = "http_requests_duration_seconds";
const WAREHOUSE_QUERY_DURATION: &str = "warehouse_query_duration_seconds";

/// Add the `/metrics` route to an existing router, installing the global recorder.
/// Only call this once per process: a second global recorder cannot be installed.
pub fn setup_metrics_routes(router: Router) -> Router {
    let recorder_handle = setup_metrics_recorder();

    router.route(
        "/metrics",
        get(move || std::future::ready(recorder_handle.render())),
    )
}

pub fn setup_metrics_recorder() -> PrometheusHandle {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUESTS_DURATION.to_string()),
            EXPONENTIAL_SECONDS,
        )
        .expect("failed to set http latency buckets")
        .set_buckets_for_metric(
            Matcher::Full(WAREHOUSE_QUERY_DURATION.to_string()),
            EXPONENTIAL_SECONDS,
        )
        .expect("failed to set warehouse latency buckets")
        .install_recorder()
        .expect("failed to install metrics recorder")
}

/// Record how long a warehouse statement took, labelled by SQL command.
pub fn record_query_duration(command: &'static str, started: Instant) {
    metrics::histogram!(WAREHOUSE_QUERY_DURATION, "command" => command)
        .record(started.elapsed().as_secs_f64());
}

/// Middleware to record some common HTTP metrics
/// Someday tower-http might provide a metrics middleware: https://github.com/tower-rs/tower-http/issues/57
pub async fn track_metrics(req: Request<Body>, next: Next) -> impl IntoResponse {
    let start = Instant::now();

    let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
        matched_path.as_str().to_owned()
    } else {
        req.uri().path().to_owned()
    };

    let method = req.method().clone();

    // Run the rest of the request handling first, so we can measure it and get response
    // codes.
    let response = next.run(req).await;

    let latency = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    let labels = [
        ("method", method.to_string()),
        ("path", path),
        ("status", status),
    ];

    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!(HTTP_REQUESTS_DURATION, &labels).record(latency);

    response
}
