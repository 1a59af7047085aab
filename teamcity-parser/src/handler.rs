use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::prometheus::report_dropped_events;
use crate::router;

/// Push endpoint. Always acknowledges with 204 No Content: a failure is logged with the
/// original payload attached and the broker is not asked to redeliver.
pub async fn push(
    State(state): State<router::State>,
    body: Result<Bytes, BytesRejection>,
) -> StatusCode {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            report_dropped_events("body_rejected", 1);
            warn!(errors = %rejection, json_payload = "", "data not saved to warehouse");
            return StatusCode::NO_CONTENT;
        }
    };

    match state.pipeline.process(&body).await {
        Ok(outcome) => debug!(outcome = ?outcome, "processed push"),
        Err(err) => {
            report_dropped_events(err.cause(), 1);
            warn!(
                errors = %err,
                json_payload = %String::from_utf8_lossy(&body),
                "data not saved to warehouse"
            );
        }
    }

    StatusCode::NO_CONTENT
}
