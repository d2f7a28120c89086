//! Persisted session-log records and the synthetic UI-event encoding.
//!
//! A stored session is an ordered array of records:
//! ```jsonl
//! {"id":"r1","role":"user","content":"fix the tests"}
//! {"id":"r2","role":"tool","toolName":"__ui__","toolOutput":"{\"eventType\":\"streamThinking\",\"payload\":{...}}"}
//! {"id":"r3","role":"assistant","content":"Done.","model":"sonnet"}
//! ```
//! UI events ride as `tool` records whose `toolName` is `__ui__` and whose
//! `toolOutput` is a JSON string `{eventType, payload}`. The replay builder
//! decodes these in log order exactly as the live reducer consumed them.

use crate::event::UiEvent;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use thiserror::Error;

/// Tool name marking a synthetic UI-event record.
pub const UI_TOOL_NAME: &str = "__ui__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// One persisted log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<String>,
}

impl LogRecord {
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: Some(content.into()),
            model: None,
            tool_name: None,
            tool_output: None,
        }
    }

    pub fn assistant(
        id: impl Into<String>,
        content: impl Into<String>,
        model: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: Some(content.into()),
            model,
            tool_name: None,
            tool_output: None,
        }
    }

    pub fn is_ui(&self) -> bool {
        self.role == Role::Tool && self.tool_name.as_deref() == Some(UI_TOOL_NAME)
    }
}

/// The JSON envelope stored in a synthetic record's `toolOutput`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiEnvelope {
    event_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogError {
    #[error("record {id} is not a synthetic UI record")]
    NotUiRecord { id: String },
    #[error("record {id} has no toolOutput")]
    MissingOutput { id: String },
    #[error("record {id} carries a malformed envelope: {source}")]
    BadEnvelope {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("io error reading log: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed record on line {line}: {source}")]
    BadRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Encode a live event into its persisted form.
pub fn encode_ui_record(id: impl Into<String>, event: &UiEvent) -> LogRecord {
    // The event serializes as `{type, sessionId?, ...payload}`; the stored
    // envelope splits the discriminant out as `eventType`.
    let mut value = serde_json::to_value(event).unwrap_or_default();
    let event_type = value
        .as_object_mut()
        .and_then(|map| map.remove("type"))
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());

    let envelope = UiEnvelope {
        event_type,
        payload: value,
    };

    LogRecord {
        id: id.into(),
        role: Role::Tool,
        content: None,
        model: None,
        tool_name: Some(UI_TOOL_NAME.to_string()),
        tool_output: serde_json::to_string(&envelope).ok(),
    }
}

/// Decode a synthetic record back into the event it was encoded from.
///
/// Unknown event types decode to [`crate::event::UiEventKind::Unknown`] rather than
/// failing; only a structurally broken envelope is an error.
pub fn decode_ui_record(record: &LogRecord) -> Result<UiEvent, LogError> {
    if !record.is_ui() {
        return Err(LogError::NotUiRecord {
            id: record.id.clone(),
        });
    }
    let output = record.tool_output.as_deref().ok_or(LogError::MissingOutput {
        id: record.id.clone(),
    })?;

    let envelope: UiEnvelope =
        serde_json::from_str(output).map_err(|source| LogError::BadEnvelope {
            id: record.id.clone(),
            source,
        })?;

    let mut value = match envelope.payload {
        serde_json::Value::Object(map) => serde_json::Value::Object(map),
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        other => {
            return Err(LogError::BadEnvelope {
                id: record.id.clone(),
                source: serde::de::Error::custom(format!(
                    "payload must be an object, got {other}"
                )),
            });
        }
    };
    if let Some(map) = value.as_object_mut() {
        map.insert(
            "type".to_string(),
            serde_json::Value::String(envelope.event_type),
        );
    }

    serde_json::from_value(value).map_err(|source| LogError::BadEnvelope {
        id: record.id.clone(),
        source,
    })
}

/// Read records from a JSONL stream. Blank lines are skipped; a malformed
/// line is a hard error at this layer (callers that want graceful
/// degradation decode records individually).
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<LogRecord>, LogError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|source| LogError::BadRecord {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write records as JSONL, one per line.
pub fn write_records<W: Write>(mut writer: W, records: &[LogRecord]) -> Result<(), LogError> {
    for record in records {
        let line = serde_json::to_string(record).map_err(|source| LogError::BadRecord {
            line: 0,
            source,
        })?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}
