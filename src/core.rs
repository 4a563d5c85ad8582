//! Core domain types for alertstream
//!
//! This module defines the alert record accepted by the ingest endpoint, the
//! acknowledgment returned to producers, and the notice sent to every new
//! stream subscriber.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Returns the current time as an RFC 3339 string with second precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// An alert pushed by a producer and fanned out to every dashboard viewer.
///
/// Missing or `null` text fields decode as empty strings. No field is
/// validated; `severity` in particular is an open vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AlertEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: String,
    /// RFC 3339 date-time. Filled in by [`AlertEvent::normalize`] when empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    /// Arbitrary structured data attached by the producer.
    #[serde(default, skip_serializing_if = "metadata_is_empty")]
    pub metadata: Option<Map<String, Value>>,
}

impl AlertEvent {
    /// Parses an alert from a raw request body.
    ///
    /// A bare `null` body decodes as an empty alert, and a repeated key keeps
    /// its last value.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        let fields: Option<Map<String, Value>> = serde_json::from_slice(body)?;
        serde_json::from_value(Value::Object(fields.unwrap_or_default()))
    }

    /// Fills in the timestamp if the producer left it empty.
    ///
    /// A populated timestamp is never touched, so normalizing twice is a no-op.
    pub fn normalize(&mut self) {
        if self.timestamp.is_empty() {
            self.timestamp = now_rfc3339();
        }
    }

    /// Serializes the alert into the single-line JSON payload carried by a
    /// stream frame.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn metadata_is_empty(metadata: &Option<Map<String, Value>>) -> bool {
    metadata.as_ref().map_or(true, Map::is_empty)
}

/// The body returned by the ingest endpoint once an alert was broadcast.
///
/// The timestamp is taken when the response is built and is independent of
/// the alert's own timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestAck {
    pub status: String,
    pub timestamp: String,
}

impl IngestAck {
    pub fn accepted() -> Self {
        Self {
            status: "accepted".to_string(),
            timestamp: now_rfc3339(),
        }
    }
}

/// The first frame every stream subscriber receives.
#[derive(Debug, Clone, Serialize)]
pub struct StreamNotice {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: &'static str,
}

impl StreamNotice {
    pub const CONNECTED: StreamNotice = StreamNotice {
        kind: "connected",
        message: "Connected to alert stream",
    };

    pub fn to_payload(&self) -> String {
        // Two static string fields cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}
