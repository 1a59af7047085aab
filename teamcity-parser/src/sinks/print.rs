use async_trait::async_trait;
use tracing::info;

use crate::api::ParserError;
use crate::event::NormalizedEvent;
use crate::sinks::EventSink;

/// Logs rows instead of writing them, for local runs without a warehouse.
pub struct PrintSink {}

#[async_trait]
impl EventSink for PrintSink {
    async fn insert_row(&self, row: NormalizedEvent) -> Result<(), ParserError> {
        info!("single event: {:?}", row);

        Ok(())
    }

    async fn set_change_project(
        &self,
        change_id: &str,
        project: &str,
    ) -> Result<u64, ParserError> {
        info!(change_id, project, "change project update");

        Ok(0)
    }
}
