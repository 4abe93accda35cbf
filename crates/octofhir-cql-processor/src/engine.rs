//! Capabilities required from the external CQL evaluation engine
//!
//! The processor never interprets ELM. An [`EvaluationEngine`] binds a library,
//! its dependency repository, a value-set cache, parameters and an optional
//! message listener into a [`CqlExecutor`], which runs either the whole
//! library or one named expression against a [`PatientSource`].

use crate::datetime::ExecutionDateTime;
use crate::elm::ElmLibrary;
use crate::repository::LibraryRepository;
use crate::source::PatientSource;
use crate::value_set::ValueSetCache;
use async_trait::async_trait;
use indexmap::IndexMap;
use octofhir_cql_messages::MessageListener;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Library parameter values by name
pub type Parameters = IndexMap<String, Value>;

/// Expression results for one patient, by expression name
pub type PatientResults = IndexMap<String, Value>;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the evaluation engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Library could not be compiled or bound
    #[error("Invalid library {library}: {message}")]
    InvalidLibrary { library: String, message: String },

    /// Included library is not in the repository
    #[error("Unresolved library reference: {path}{}", .version.as_ref().map(|v| format!(" version '{}'", v)).unwrap_or_default())]
    UnresolvedLibrary {
        path: String,
        version: Option<String>,
    },

    /// Expression is not defined in the library
    #[error("Undefined expression: {name}")]
    UndefinedExpression { name: String },

    /// Runtime failure inside the CQL logic
    #[error("Evaluation error: {message}")]
    Evaluation { message: String },

    /// Anything else reported by the engine
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Create an invalid library error
    pub fn invalid_library(library: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidLibrary {
            library: library.into(),
            message: message.into(),
        }
    }

    /// Create an unresolved library error
    pub fn unresolved_library(path: impl Into<String>, version: Option<&str>) -> Self {
        Self::UnresolvedLibrary {
            path: path.into(),
            version: version.map(str::to_string),
        }
    }

    /// Create an undefined expression error
    pub fn undefined_expression(name: impl Into<String>) -> Self {
        Self::UndefinedExpression { name: name.into() }
    }

    /// Create an evaluation error
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }
}

/// Results of one execution
///
/// Produced fresh by every executor call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResults {
    /// Patient-context results, by patient id
    pub patient_results: IndexMap<String, PatientResults>,
    /// Unfiltered-context results, by expression name
    #[serde(default)]
    pub unfiltered_results: PatientResults,
}

impl ExecutionResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a patient's value for an expression
    pub fn insert(&mut self, patient_id: impl Into<String>, expression: impl Into<String>, value: Value) {
        self.patient_results
            .entry(patient_id.into())
            .or_default()
            .insert(expression.into(), value);
    }

    /// Results for one patient
    pub fn for_patient(&self, patient_id: &str) -> Option<&PatientResults> {
        self.patient_results.get(patient_id)
    }

    /// Take the results for one patient
    pub fn into_patient(mut self, patient_id: &str) -> Option<PatientResults> {
        self.patient_results.shift_remove(patient_id)
    }
}

/// Everything an engine needs to build an executor
pub struct ExecutorBinding {
    /// The library to execute
    pub library: ElmLibrary,
    /// Named libraries the main library may include
    pub repository: LibraryRepository,
    /// Value sets for the engine's terminology service
    pub value_sets: ValueSetCache,
    /// Parameter values; `None` leaves every parameter at its default
    pub parameters: Option<Parameters>,
    /// Receiver for `Message()` output and engine diagnostics
    pub listener: Option<Arc<dyn MessageListener>>,
}

impl std::fmt::Debug for ExecutorBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorBinding")
            .field("library", self.library.identifier())
            .field("repository", &self.repository)
            .field("value_sets", &self.value_sets.len())
            .field("parameters", &self.parameters)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

/// A CQL engine able to compile and bind ELM libraries
pub trait EvaluationEngine {
    /// Bind a library and its environment into an executor
    ///
    /// Malformed libraries or broken dependency wiring are reported here.
    fn bind(&self, binding: ExecutorBinding) -> EngineResult<Box<dyn CqlExecutor>>;
}

/// A library bound to its terminology, parameters and listener
///
/// Both entry points return results keyed by patient id. When `at` is `None`
/// the engine uses its own notion of "now".
#[async_trait]
pub trait CqlExecutor: Send + Sync {
    /// Evaluate every definition in the library for each patient in `source`
    async fn exec(
        &self,
        source: &mut dyn PatientSource,
        at: Option<&ExecutionDateTime>,
    ) -> EngineResult<ExecutionResults>;

    /// Evaluate one named expression for each patient in `source`
    ///
    /// Advances the source cursor; callers are responsible for rewinding it.
    async fn exec_expression(
        &self,
        expression: &str,
        source: &mut dyn PatientSource,
        at: Option<&ExecutionDateTime>,
    ) -> EngineResult<ExecutionResults>;
}
