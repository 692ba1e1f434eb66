//! The `{type, data, timestamp}` envelope used in both directions on the
//! realtime channel.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// One JSON message exchanged over the WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Event type name, e.g. `"register"`, `"location_update"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Type-specific payload. The channel never inspects it.
    pub data: Value,

    /// ISO-8601 creation time. Empty when an inbound frame omitted it.
    pub timestamp: String,
}

impl Frame {
    /// Build an outbound frame stamped with the current UTC time.
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Parse an inbound text payload.
    ///
    /// The payload must be a JSON object with a string `type`. A missing
    /// `data` becomes `null`; a missing or non-string `timestamp` is empty.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(malformed("frame is not a JSON object"));
        };

        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(_) => return Err(malformed("`type` is not a string")),
            None => return Err(malformed("missing `type` field")),
        };
        let data = fields.remove("data").unwrap_or(Value::Null);
        let timestamp = match fields.remove("timestamp") {
            Some(Value::String(ts)) => ts,
            _ => String::new(),
        };

        Ok(Self {
            kind,
            data,
            timestamp,
        })
    }

    /// Serialize for the wire.
    pub fn to_text(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Deserialization {
            message: format!("failed to encode frame: {e}"),
            body: String::new(),
        })
    }
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedFrame {
        reason: reason.into(),
    }
}
