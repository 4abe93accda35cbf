//! Error types for the CQL processor

use crate::engine::EngineError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for processor operations
pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// Errors that can occur while assembling or driving a processor
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// ELM document is not a library
    #[error("Invalid ELM library: {message}")]
    InvalidLibrary { message: String },

    /// Value-set cache has an unexpected shape
    #[error("Invalid value set cache: {message}")]
    InvalidValueSetCache { message: String },

    /// Bundle could not be read
    #[error("Invalid bundle: {message}")]
    InvalidBundle { message: String },

    /// Bundle has no Patient resource
    #[error("Bundle contains no Patient resource")]
    MissingPatient,

    /// Bundle has more than one Patient resource
    #[error("Bundle contains {} Patient resources ({}), expected exactly one", .ids.len(), .ids.join(", "))]
    MultiplePatients { ids: Vec<String> },

    /// Patient resource has no id
    #[error("Patient resource has no id")]
    MissingPatientId,

    /// Execution timestamp could not be parsed
    #[error("Invalid execution date/time '{value}': {message}")]
    InvalidExecutionDateTime { value: String, message: String },

    /// Reading a library file or directory failed
    #[error("Failed to read library at {}: {source}", .path.display())]
    LibraryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error raised by the evaluation engine, passed through untouched
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ProcessorError {
    /// Create an invalid library error
    pub fn invalid_library(message: impl Into<String>) -> Self {
        Self::InvalidLibrary {
            message: message.into(),
        }
    }

    /// Create an invalid value-set cache error
    pub fn invalid_value_set_cache(message: impl Into<String>) -> Self {
        Self::InvalidValueSetCache {
            message: message.into(),
        }
    }

    /// Create an invalid bundle error
    pub fn invalid_bundle(message: impl Into<String>) -> Self {
        Self::InvalidBundle {
            message: message.into(),
        }
    }

    /// Create an invalid execution date/time error
    pub fn invalid_execution_date_time(
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidExecutionDateTime {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from the engine
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}
