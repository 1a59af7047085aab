use async_trait::async_trait;
use tracing::debug;
use warehouse_common::warehouse::PgWarehouse;

use crate::api::ParserError;
use crate::event::NormalizedEvent;
use crate::sinks::EventSink;

pub struct WarehouseSink {
    warehouse: PgWarehouse,
}

impl WarehouseSink {
    pub fn new(warehouse: PgWarehouse) -> Self {
        Self { warehouse }
    }
}

#[async_trait]
impl EventSink for WarehouseSink {
    async fn insert_row(&self, row: NormalizedEvent) -> Result<(), ParserError> {
        let inserted = self
            .warehouse
            .insert_event(&row.to_row())
            .await
            .map_err(ParserError::InsertError)?;

        if !inserted {
            debug!(signature = %row.signature, "row already in warehouse");
        }

        Ok(())
    }

    async fn set_change_project(
        &self,
        change_id: &str,
        project: &str,
    ) -> Result<u64, ParserError> {
        self.warehouse
            .set_change_project(change_id, project)
            .await
            .map_err(ParserError::UpdateError)
    }
}
