use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::trace::TraceLayer;
use warehouse_common::metrics::{setup_metrics_routes, track_metrics};

use crate::pipeline::Pipeline;
use crate::{handler, sinks};

#[derive(Clone)]
pub struct State {
    pub pipeline: Pipeline,
}

pub async fn index() -> &'static str {
    "teamcity-parser"
}

pub fn router<S: sinks::EventSink + Send + Sync + 'static>(
    sink: S,
    map_changes: bool,
    metrics: bool,
    max_body_size: usize,
) -> Router {
    let state = State {
        pipeline: Pipeline::new(Arc::new(sink), map_changes),
    };

    let router = Router::new()
        .route("/", get(index).post(handler::push))
        .route("/_readiness", get(index))
        .route("/_liveness", get(index)) // No async loop for now, just check axum health
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Don't install metrics unless asked to
    // Installing a global recorder when the parser is used as a library (during tests etc)
    // does not work well.
    if metrics {
        setup_metrics_routes(router)
    } else {
        router
    }
}
