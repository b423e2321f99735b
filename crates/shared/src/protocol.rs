use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{domain::ParticipantId, error::EnvelopeError};

/// Server-supplied send time. Passed through untouched; the server decides
/// the representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub Value);

impl Timestamp {
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self(Value::Null)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(at) = self.as_datetime() {
            return write!(f, "{}", at.format("%H:%M"));
        }
        match &self.0 {
            Value::Null => Ok(()),
            Value::String(raw) => f.write_str(raw),
            other => write!(f, "{other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender_id: ParticipantId,
    pub content: String,
    #[serde(default)]
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEnvelope {
    Message {
        sender_id: ParticipantId,
        message: String,
        #[serde(default)]
        timestamp: Timestamp,
    },
    History {
        messages: Vec<HistoryEntry>,
    },
}

impl InboundEnvelope {
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(text).map_err(EnvelopeError::Decode)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEnvelope {
    Message { message: String },
}

impl OutboundEnvelope {
    pub fn message(body: impl Into<String>) -> Self {
        Self::Message {
            message: body.into(),
        }
    }

    pub fn encode(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::Encode)
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
