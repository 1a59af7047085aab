#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use tracing_subscriber::fmt::MakeWriter;

use teamcity_parser::api::ParserError;
use teamcity_parser::event::NormalizedEvent;
use teamcity_parser::sinks::EventSink;

pub const TEAMCITY_HEADERS: &str =
    r#"{"Content-Type": "application/json", "X-Tcwebhooks-Request-Id": "8e5f6c1d-4be2-4c29-a3a1-2a4c4f0f5b7e"}"#;

#[derive(Clone, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<Vec<NormalizedEvent>>>,
    updates: Arc<Mutex<Vec<(String, String)>>>,
    fail_inserts: bool,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            fail_inserts: true,
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Vec<NormalizedEvent> {
        self.rows.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(String, String)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn insert_row(&self, row: NormalizedEvent) -> Result<(), ParserError> {
        if self.fail_inserts {
            return Err(ParserError::NoDataToProcess);
        }
        self.rows.lock().unwrap().push(row);
        Ok(())
    }

    async fn set_change_project(
        &self,
        change_id: &str,
        project: &str,
    ) -> Result<u64, ParserError> {
        self.updates
            .lock()
            .unwrap()
            .push((change_id.to_owned(), project.to_owned()));
        Ok(1)
    }
}

pub fn change(version: &str, vcs_root: &str) -> Value {
    json!({
        "version": version,
        "change": {"vcsRoot": vcs_root, "username": "jdoe", "comment": "update"}
    })
}

pub fn build_finished() -> Value {
    json!({
        "build": {
            "notifyType": "buildFinished",
            "buildId": "36599",
            "projectName": "ShiftLog",
            "buildNumber": "1.4.212",
            "buildResult": "success",
            "agentName": "agent-7",
            "buildStatusUrl": "https://teamcity.example.com/viewLog.html?buildId=36599",
            "changes": [
                change("5d41402a", "deployments"),
                change("abc", "shiftlog-api"),
                change("def", "shiftlog-web"),
                change("7d793037", "deployments")
            ]
        }
    })
}

/// A push envelope as the broker delivers it, carrying `payload` as its data.
pub fn envelope(payload: &Value, headers: Option<&str>) -> Value {
    let attributes = match headers {
        Some(headers) => json!({"headers": headers}),
        None => json!({}),
    };

    json!({
        "message": {
            "attributes": attributes,
            "data": base64::engine::general_purpose::STANDARD.encode(payload.to_string()),
            "messageId": "2070443601311540",
            "message_id": "2070443601311540",
            "publishTime": "2021-02-26T19:13:55.749Z",
            "publish_time": "2021-02-26T19:13:55.749Z"
        },
        "subscription": "projects/four-keys/subscriptions/teamcity"
    })
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
