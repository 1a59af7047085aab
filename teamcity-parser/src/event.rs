use std::fmt::Write;
use std::str::FromStr;

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use tracing::instrument;
use warehouse_common::warehouse::EventRow;

use crate::api::ParserError;
use crate::envelope::ValidatedMessage;

pub const SOURCE: &str = "teamcity";

/// VCS root of the config repository that automated manifest bumps are committed to.
pub const DEPLOYMENTS_VCS_ROOT: &str = "deployments";

/// Build fields with no analytics value: agent details, branch objects, runner lists,
/// free-text status, templated messages and internal ids.
const REDUNDANT_KEYS: &[&str] = &[
    "agentHostname",
    "agentName",
    "agentOs",
    "branch",
    "branchDisplayName",
    "branchIsDefault",
    "branchName",
    "buildExternalTypeId",
    "buildFullName",
    "buildInternalTypeId",
    "buildIsPersonal",
    "buildName",
    "buildResultDelta",
    "buildResultPrevious",
    "buildRunners",
    "buildStateDescription",
    "buildStatus",
    "buildStatusHtml",
    "buildStatusUrl",
    "buildTags",
    "buildTypeId",
    "changeFileListCount",
    "extraParameters",
    "derivedBuildEventType",
    "maxChangeFileListCountExceeded",
    "maxChangeFileListSize",
    "message",
    "rootUrl",
    "projectExternalId",
    "projectId",
    "projectInternalId",
    "teamcityProperties",
    "text",
    "triggeredBy",
];

/// TeamCity notification types this worker turns into events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyType {
    BuildFinished,
}

impl NotifyType {
    pub const SUPPORTED: &'static [NotifyType] = &[NotifyType::BuildFinished];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyType::BuildFinished => "buildFinished",
        }
    }
}

impl FromStr for NotifyType {
    type Err = ParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotifyType::SUPPORTED
            .iter()
            .find(|supported| supported.as_str() == s)
            .copied()
            .ok_or_else(|| ParserError::UnsupportedEventType(s.to_owned()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Deployment,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Deployment => "deployment",
        }
    }
}

/// A finished build is a deployment as far as the warehouse is concerned.
impl From<NotifyType> for EventType {
    fn from(notify_type: NotifyType) -> Self {
        match notify_type {
            NotifyType::BuildFinished => EventType::Deployment,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChangeRecord {
    pub version: String,
    pub change: ChangeDescriptor,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChangeDescriptor {
    #[serde(rename = "vcsRoot")]
    pub vcs_root: String,
}

impl ChangeRecord {
    pub fn is_deployment_manifest(&self) -> bool {
        self.change.vcs_root == DEPLOYMENTS_VCS_ROOT
    }
}

/// The `build` object of a tcWebHooks payload. Fields we don't name are kept in `extra`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBuildMetadata {
    pub notify_type: String,
    #[serde(deserialize_with = "string_or_number")]
    pub build_id: String,
    pub project_name: String,
    pub changes: Vec<ChangeRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawBuildMetadata {
    pub fn strip_redundant_keys(&mut self) {
        for key in REDUNDANT_KEYS {
            self.extra.remove(*key);
        }
    }

    /// Versions of the changes that came from source repositories, in delivery order.
    pub fn source_changes(&self) -> Vec<String> {
        self.changes
            .iter()
            .filter(|record| !record.is_deployment_manifest())
            .map(|record| record.version.clone())
            .collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FilteredMetadata<'a> {
    notify_type: &'a str,
    build_id: &'a str,
    project_name: &'a str,
    changes: &'a [String],
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

/// The warehouse row produced for one accepted push.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NormalizedEvent {
    pub event_type: EventType,
    pub id: String,
    pub project: String,
    pub metadata: String,
    pub time_created: String,
    pub signature: String,
    pub msg_id: String,
    pub source: &'static str,
    /// Source change versions, handed to the change mapper. Also present in `metadata`.
    #[serde(skip)]
    pub changes: Vec<String>,
}

impl NormalizedEvent {
    pub fn to_row(&self) -> EventRow {
        EventRow {
            event_type: self.event_type.as_str().to_owned(),
            id: self.id.clone(),
            project: Some(self.project.clone()),
            metadata: self.metadata.clone(),
            time_created: self.time_created.clone(),
            signature: self.signature.clone(),
            msg_id: self.msg_id.clone(),
            source: self.source.to_owned(),
        }
    }
}

/// Turn a TeamCity build message into a warehouse event.
#[instrument(skip_all)]
pub fn normalize(message: &ValidatedMessage) -> Result<NormalizedEvent, ParserError> {
    let signature = create_unique_id(&message.raw);

    let build = decode_build(message.data.as_deref())?;

    let notify_type: NotifyType = match build.get("notifyType") {
        Some(Value::String(notify_type)) => notify_type.parse()?,
        Some(other) => return Err(ParserError::UnsupportedEventType(other.to_string())),
        None => {
            return Err(ParserError::DecodeError(String::from(
                "build has no notifyType",
            )))
        }
    };

    let mut metadata: RawBuildMetadata = serde_json::from_value(Value::Object(build))
        .map_err(|e| ParserError::DecodeError(format!("invalid build metadata: {}", e)))?;
    metadata.strip_redundant_keys();

    let changes = metadata.source_changes();
    let event_type = EventType::from(notify_type);

    let serialized = serde_json::to_string(&FilteredMetadata {
        notify_type: &metadata.notify_type,
        build_id: &metadata.build_id,
        project_name: &metadata.project_name,
        changes: &changes,
        extra: &metadata.extra,
    })
    .map_err(|e| ParserError::DecodeError(format!("failed to encode metadata: {}", e)))?;

    let time_created = message
        .publish_time
        .clone()
        .ok_or_else(|| ParserError::MalformedPayload(String::from("message has no publish time")))?;
    let msg_id = message
        .message_id
        .clone()
        .ok_or_else(|| ParserError::MalformedPayload(String::from("message has no message id")))?;

    let event = NormalizedEvent {
        event_type,
        id: metadata.build_id,
        project: metadata.project_name,
        metadata: serialized,
        time_created,
        signature,
        msg_id,
        source: SOURCE,
        changes,
    };

    tracing::debug!(event=?event, "normalized teamcity event");

    Ok(event)
}

/// Hex SHA-1 of the compact JSON form of the message, with object keys sorted.
pub fn create_unique_id(message: &Value) -> String {
    let mut hasher = Sha1::new();
    hasher.update(sorted_keys(message).to_string().as_bytes());
    let result = hasher.finalize();

    result.iter().fold(String::new(), |mut acc, byte| {
        let _ = write!(acc, "{:02x}", byte);
        acc
    })
}

fn sorted_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted_keys(v)))
                    .collect(),
            )
        }
        Value::Array(values) => Value::Array(values.iter().map(sorted_keys).collect()),
        other => other.clone(),
    }
}

fn decode_build(data: Option<&str>) -> Result<Map<String, Value>, ParserError> {
    let data = data.ok_or_else(|| ParserError::DecodeError(String::from("message has no data")))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| ParserError::DecodeError(format!("invalid base64 data: {}", e)))?;
    let payload = String::from_utf8(bytes)
        .map_err(|e| ParserError::DecodeError(format!("invalid payload encoding: {}", e)))?;

    let mut body: Map<String, Value> = serde_json::from_str(payload.trim())
        .map_err(|e| ParserError::DecodeError(format!("invalid payload JSON: {}", e)))?;

    match body.remove("build") {
        Some(Value::Object(build)) => Ok(build),
        Some(_) => Err(ParserError::DecodeError(String::from(
            "build is not an object",
        ))),
        None => Err(ParserError::DecodeError(String::from(
            "payload has no build object",
        ))),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}
