use async_trait::async_trait;
use tracing::debug;

use crate::api::ParserError;
use crate::event::NormalizedEvent;

pub mod print;
pub mod warehouse;

#[async_trait]
pub trait EventSink {
    async fn insert_row(&self, row: NormalizedEvent) -> Result<(), ParserError>;

    /// Set the project of the warehouse rows identified by `change_id`, returning how many changed.
    async fn set_change_project(&self, change_id: &str, project: &str)
        -> Result<u64, ParserError>;

    /// `None` means the push was not a recognized event, so there is nothing to write.
    async fn insert(&self, row: Option<NormalizedEvent>) -> Result<(), ParserError> {
        match row {
            Some(row) => self.insert_row(row).await,
            None => {
                debug!("no row to insert");
                Ok(())
            }
        }
    }
}
