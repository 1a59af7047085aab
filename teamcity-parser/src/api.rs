use thiserror::Error;
use warehouse_common::warehouse::WarehouseError;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("malformed push payload: {0}")]
    MalformedPayload(String),
    #[error("missing pubsub attributes")]
    MissingAttributes,
    #[error("invalid headers attribute: {0}")]
    InvalidHeaders(#[source] serde_json::Error),

    #[error("failed to decode build payload: {0}")]
    DecodeError(String),
    #[error("unsupported TeamCity event: '{0}'")]
    UnsupportedEventType(String),

    #[error("no data to process")]
    NoDataToProcess,

    #[error("failed to insert row into warehouse: {0}")]
    InsertError(#[source] WarehouseError),
    #[error("failed to update change project in warehouse: {0}")]
    UpdateError(#[source] WarehouseError),
}

impl ParserError {
    /// Short label for the error kind, used to tag dropped-event metrics.
    pub fn cause(&self) -> &'static str {
        match self {
            ParserError::MalformedPayload(_) => "malformed_payload",
            ParserError::MissingAttributes => "missing_attributes",
            ParserError::InvalidHeaders(_) => "invalid_headers",
            ParserError::DecodeError(_) => "decode_error",
            ParserError::UnsupportedEventType(_) => "unsupported_event_type",
            ParserError::NoDataToProcess => "no_data",
            ParserError::InsertError(_) => "insert_error",
            ParserError::UpdateError(_) => "update_error",
        }
    }
}
