//! Recorded message type

use crate::Severity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A message received from the evaluation engine
///
/// `source` holds the compact JSON text of the source object as it was when
/// the message arrived, so later changes to that object do not show up here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Serialized source object
    pub source: String,
    /// Coded representation of the message
    pub code: String,
    /// Severity token
    pub severity: Severity,
    /// Message content
    pub message: String,
}

impl Message {
    /// Capture a message, serializing `source` immediately
    pub fn capture(
        source: &Value,
        code: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.to_string(),
            code: code.into(),
            severity,
            message: message.into(),
        }
    }

    /// Parse the stored source text back into JSON
    pub fn source_value(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.source)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capture_serializes_source() {
        let source = json!({"resourceType": "Patient", "id": "pt-1"});
        let msg = Message::capture(&source, "AGE", Severity::Trace, "checking age");

        assert_eq!(msg.source, r#"{"resourceType":"Patient","id":"pt-1"}"#);
        assert_eq!(msg.source_value().unwrap(), source);
    }

    #[test]
    fn test_capture_scalar_source() {
        let msg = Message::capture(&Value::Null, "X", Severity::Message, "m");
        assert_eq!(msg.source, "null");

        let msg = Message::capture(&json!("text"), "X", Severity::Message, "m");
        assert_eq!(msg.source, "\"text\"");
    }

    #[test]
    fn test_display() {
        let msg = Message::capture(&json!(1), "E01", Severity::Warning, "low value");
        assert_eq!(msg.to_string(), "[Warning] E01: low value");
    }

    #[test]
    fn test_serde_field_names() {
        let msg = Message::capture(&json!(true), "C", Severity::Error, "boom");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({"source": "true", "code": "C", "severity": "Error", "message": "boom"})
        );
    }
}
