use std::sync::Arc;

use metrics::counter;
use tracing::{instrument, warn};

use crate::api::ParserError;
use crate::changes::map_changes;
use crate::classify::{classify, EventClass};
use crate::envelope::{parse_envelope, validate};
use crate::event::normalize;
use crate::prometheus::{EVENTS_INSERTED_TOTAL, EVENTS_RECEIVED_TOTAL, EVENTS_SKIPPED_TOTAL};
use crate::sinks::EventSink;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The push was not a TeamCity build event; nothing was written.
    Skipped,
    Inserted {
        id: String,
        /// Warehouse rows attributed to the project, when change mapping ran and succeeded.
        changes_mapped: Option<u64>,
    },
}

/// Everything needed to take one push delivery from request body to warehouse row.
/// Holds no per-request state, so one instance is shared by all requests.
#[derive(Clone)]
pub struct Pipeline {
    sink: Arc<dyn EventSink + Send + Sync>,
    map_changes: bool,
}

impl Pipeline {
    pub fn new(sink: Arc<dyn EventSink + Send + Sync>, map_changes: bool) -> Self {
        Self { sink, map_changes }
    }

    #[instrument(skip_all, fields(msg_id, event_type, project))]
    pub async fn process(&self, body: &[u8]) -> Result<Outcome, ParserError> {
        let envelope = parse_envelope(body)?;
        let message = validate(&envelope)?;

        counter!(EVENTS_RECEIVED_TOTAL).increment(1);
        if let Some(msg_id) = &message.message_id {
            tracing::Span::current().record("msg_id", msg_id.as_str());
        }

        let event = match classify(&message)? {
            Some(EventClass::TeamcityBuild) => normalize(&message)?,
            None => {
                self.sink.insert(None).await?;
                counter!(EVENTS_SKIPPED_TOTAL).increment(1);
                return Ok(Outcome::Skipped);
            }
        };

        tracing::Span::current().record("event_type", event.event_type.as_str());
        tracing::Span::current().record("project", event.project.as_str());

        let id = event.id.clone();
        let project = event.project.clone();
        let changes = event.changes.clone();

        self.sink.insert(Some(event)).await?;
        counter!(EVENTS_INSERTED_TOTAL).increment(1);

        let changes_mapped = if self.map_changes && !changes.is_empty() {
            // Correlation is best-effort: the row is already stored.
            match map_changes(self.sink.as_ref(), &changes, &project).await {
                Ok(total) => Some(total),
                Err(err) => {
                    warn!(errors = %err, "failed to map changes to project");
                    None
                }
            }
        } else {
            None
        };

        Ok(Outcome::Inserted { id, changes_mapped })
    }
}
