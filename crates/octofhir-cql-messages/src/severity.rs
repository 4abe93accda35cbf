//! Message severity tokens

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Severity token attached to an engine message
///
/// The tokens match the `severity` argument of the CQL `Message()` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Trace output, usually from `Message(..., 'Trace', ...)`
    Trace,
    /// Informational message
    Message,
    /// Warning - evaluation continues
    Warning,
    /// Error - reported only, evaluation is not interrupted by the sink
    Error,
}

impl Severity {
    /// The token as it appears in CQL and in serialized messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "Trace",
            Severity::Message => "Message",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }

    /// Matching level on the `log` facade
    pub fn log_level(&self) -> log::Level {
        match self {
            Severity::Trace => log::Level::Trace,
            Severity::Message => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown severity token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown message severity: {0}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "message" => Ok(Severity::Message),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}
