//! Push envelope validation.
//!
//! A push subscription POSTs a JSON envelope shaped like:
//!
//! ```json
//! {
//!   "message": {
//!     "attributes": {"headers": "{...}"},
//!     "data": "<base64>",
//!     "message_id": "2070443601311540",
//!     "publish_time": "2021-02-26T19:13:55.749Z"
//!   },
//!   "subscription": "projects/myproject/subscriptions/mysubscription"
//! }
//! ```
//!
//! Only `message` and `message.attributes` are required at this stage.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::api::ParserError;

/// A broker message that passed envelope validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedMessage {
    /// The `message` object exactly as delivered, used to sign the event.
    pub raw: Value,
    pub data: Option<String>,
    pub attributes: HashMap<String, String>,
    pub message_id: Option<String>,
    pub publish_time: Option<String>,
}

// The broker sends both spellings of the id and timestamp fields, so they are
// read separately rather than through serde aliases, which reject duplicates.
#[derive(Deserialize)]
struct PubsubMessage {
    data: Option<String>,
    attributes: HashMap<String, String>,
    message_id: Option<String>,
    #[serde(rename = "messageId")]
    message_id_camel: Option<String>,
    #[serde(rename = "publishTime")]
    publish_time_camel: Option<String>,
    publish_time: Option<String>,
}

/// Parse a request body into a JSON envelope. An empty body is a malformed payload.
pub fn parse_envelope(body: &[u8]) -> Result<Value, ParserError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ParserError::MalformedPayload(String::from(
            "expecting JSON payload",
        )));
    }

    serde_json::from_slice(body)
        .map_err(|e| ParserError::MalformedPayload(format!("invalid JSON body: {}", e)))
}

/// Check the envelope carries a `message` with `attributes`, and extract it.
pub fn validate(envelope: &Value) -> Result<ValidatedMessage, ParserError> {
    let envelope = match envelope {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        Value::Object(map) => Some(map),
        _ => {
            return Err(ParserError::MalformedPayload(String::from(
                "not a valid Pub/Sub message",
            )))
        }
    }
    .ok_or_else(|| ParserError::MalformedPayload(String::from("expecting JSON payload")))?;

    let message = envelope
        .get("message")
        .ok_or_else(|| ParserError::MalformedPayload(String::from("not a valid Pub/Sub message")))?;

    let fields = message.as_object().ok_or_else(|| {
        ParserError::MalformedPayload(String::from("Pub/Sub message is not an object"))
    })?;

    if !fields.contains_key("attributes") {
        return Err(ParserError::MissingAttributes);
    }

    let parsed: PubsubMessage = serde_json::from_value(message.clone())
        .map_err(|e| ParserError::MalformedPayload(format!("invalid Pub/Sub message: {}", e)))?;

    Ok(ValidatedMessage {
        raw: message.clone(),
        data: parsed.data,
        attributes: parsed.attributes,
        message_id: parsed.message_id.or(parsed.message_id_camel),
        publish_time: parsed.publish_time_camel.or(parsed.publish_time),
    })
}
