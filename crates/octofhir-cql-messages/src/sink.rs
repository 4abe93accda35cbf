//! Message listener contract and the collecting sink

use crate::{Message, Severity};
use parking_lot::Mutex;
use serde_json::Value;

/// Receiver for messages emitted by the engine during execution
///
/// Implementations must not panic: a listener is an observation channel and
/// must never abort evaluation.
pub trait MessageListener: Send + Sync {
    /// Receive one message
    ///
    /// * `source` - the object the engine attached to the message
    /// * `code` - coded representation of the message
    /// * `severity` - `Trace`, `Message`, `Warning` or `Error`
    /// * `message` - message content
    fn on_message(&self, source: &Value, code: &str, severity: Severity, message: &str);
}

/// Listener that keeps every message it receives, in arrival order
///
/// Appends are serialized by an internal lock, so one sink can be shared
/// through an `Arc` by several processors.
#[derive(Debug, Default)]
pub struct MessageSink {
    messages: Mutex<Vec<Message>>,
}

impl MessageSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded messages
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Messages with the given severity
    pub fn with_severity(&self, severity: Severity) -> Vec<Message> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.severity == severity)
            .cloned()
            .collect()
    }

    /// Whether any `Error` message was recorded
    pub fn has_errors(&self) -> bool {
        self.messages
            .lock()
            .iter()
            .any(|m| m.severity == Severity::Error)
    }

    /// Number of recorded messages
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Whether no message was recorded yet
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Drop all recorded messages
    pub fn clear(&self) {
        self.messages.lock().clear();
    }

    /// Take all recorded messages, leaving the sink empty
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl MessageListener for MessageSink {
    fn on_message(&self, source: &Value, code: &str, severity: Severity, message: &str) {
        let record = Message::capture(source, code, severity, message);
        log::log!(severity.log_level(), "CQL message {}", record);
        self.messages.lock().push(record);
    }
}
