//! The CQL processor
//!
//! A [`Processor`] owns one bound executor and one patient source. Load a
//! patient's bundle, then evaluate a single expression or the whole library;
//! results are narrowed to the loaded patient.

use crate::bundle::Bundle;
use crate::config::ProcessorConfig;
use crate::datetime::ExecutionDateTime;
use crate::elm::ElmLibrary;
use crate::engine::{CqlExecutor, EvaluationEngine, ExecutorBinding, Parameters, PatientResults};
use crate::error::ProcessorResult;
use crate::repository::{FHIR_HELPERS, LibraryRepository};
use crate::source::{BundlePatientSource, PatientSource};
use crate::value_set::ValueSetCache;
use indexmap::IndexMap;
use octofhir_cql_messages::MessageListener;
use serde_json::Value;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Expression name that selects whole-library evaluation
pub const EVALUATE_LIBRARY: &str = "__evaluate_library__";

/// What to evaluate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationTarget {
    /// Every definition in the library
    Library,
    /// One named expression
    Expression(String),
}

impl EvaluationTarget {
    /// Map an expression name to a target, honouring [`EVALUATE_LIBRARY`]
    pub fn from_name(name: &str) -> Self {
        if name == EVALUATE_LIBRARY {
            Self::Library
        } else {
            Self::Expression(name.to_string())
        }
    }
}

/// Result of one evaluation for the loaded patient
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// All of the patient's results, by expression name
    Library(PatientResults),
    /// Value of a single expression
    Expression(Value),
}

impl Evaluation {
    /// JSON form; library results become an object keyed by expression name
    pub fn into_value(self) -> Value {
        match self {
            Evaluation::Library(results) => Value::Object(results.into_iter().collect()),
            Evaluation::Expression(value) => value,
        }
    }

    pub fn into_library(self) -> Option<PatientResults> {
        match self {
            Evaluation::Library(results) => Some(results),
            Evaluation::Expression(_) => None,
        }
    }
}

/// Rewinds the patient source when dropped
///
/// Wraps every single-expression call so the cursor is restored on success,
/// on engine error, and when the evaluation future is dropped mid-flight.
struct RewindGuard<'a> {
    source: &'a mut dyn PatientSource,
}

impl<'a> RewindGuard<'a> {
    fn new(source: &'a mut dyn PatientSource) -> Self {
        Self { source }
    }
}

impl<'a> Deref for RewindGuard<'a> {
    type Target = dyn PatientSource + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.source
    }
}

impl DerefMut for RewindGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.source
    }
}

impl Drop for RewindGuard<'_> {
    fn drop(&mut self) {
        self.source.rewind();
    }
}

/// Builder for [`Processor`]
pub struct ProcessorBuilder {
    library: ElmLibrary,
    value_sets: ValueSetCache,
    parameters: Option<Parameters>,
    dependencies: IndexMap<String, ElmLibrary>,
    listener: Option<Arc<dyn MessageListener>>,
    source: Option<Box<dyn PatientSource>>,
    config: ProcessorConfig,
}

impl ProcessorBuilder {
    pub fn new(library: ElmLibrary, value_sets: ValueSetCache) -> Self {
        Self {
            library,
            value_sets,
            parameters: None,
            dependencies: IndexMap::new(),
            listener: None,
            source: None,
            config: ProcessorConfig::default(),
        }
    }

    /// Replace all parameter values
    pub fn parameters(mut self, parameters: Option<Parameters>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set one parameter value
    pub fn parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters
            .get_or_insert_with(Parameters::new)
            .insert(name.into(), value);
        self
    }

    /// Add a dependency library under `name`
    pub fn dependency(mut self, name: impl Into<String>, library: ElmLibrary) -> Self {
        self.dependencies.insert(name.into(), library);
        self
    }

    /// Add several dependency libraries
    pub fn dependencies(mut self, dependencies: IndexMap<String, ElmLibrary>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    /// Receive engine messages
    pub fn message_listener(mut self, listener: Arc<dyn MessageListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Use a custom patient source instead of [`BundlePatientSource`]
    pub fn patient_source(mut self, source: impl PatientSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Assemble the repository and bind the library with `engine`
    ///
    /// Registration order is: bundled FHIRHelpers, libraries from the
    /// configured directories, then explicit dependencies. Later
    /// registrations replace earlier ones with the same name. With the
    /// default configuration no directory is read.
    pub fn build<E>(self, engine: &E) -> ProcessorResult<Processor>
    where
        E: EvaluationEngine + ?Sized,
    {
        let config = self.config;

        let mut repository = LibraryRepository::with_fhir_helpers()?;

        for dir in config.library_search_paths() {
            let count = repository.load_directory(&dir)?;
            log::debug!("Loaded {} libraries from {}", count, dir.display());
        }

        for (name, library) in self.dependencies {
            let replaced = repository.insert(name.clone(), library);
            if name == FHIR_HELPERS && replaced.is_some() {
                log::warn!("Dependency '{}' replaces the bundled helper library", name);
            }
        }

        log::debug!(
            "Binding library {} with {} dependencies",
            self.library.identifier(),
            repository.len()
        );

        let binding = ExecutorBinding {
            library: self.library.clone(),
            repository: repository.clone(),
            value_sets: self.value_sets,
            parameters: self.parameters,
            listener: self.listener.clone(),
        };
        let executor = engine.bind(binding)?;

        let source: Box<dyn PatientSource> = match self.source {
            Some(source) => source,
            None => Box::new(BundlePatientSource::new(config.fhir_version)),
        };

        Ok(Processor {
            library: self.library,
            repository,
            executor,
            source,
            patient_id: None,
            listener: self.listener,
        })
    }
}

/// Evaluates one CQL library against one patient bundle at a time
///
/// Evaluation takes `&mut self`: calls on one processor are serialized by the
/// borrow checker, since the patient source carries a cursor.
pub struct Processor {
    library: ElmLibrary,
    repository: LibraryRepository,
    executor: Box<dyn CqlExecutor>,
    source: Box<dyn PatientSource>,
    patient_id: Option<String>,
    listener: Option<Arc<dyn MessageListener>>,
}

impl Processor {
    /// Start building a processor
    pub fn builder(library: ElmLibrary, value_sets: ValueSetCache) -> ProcessorBuilder {
        ProcessorBuilder::new(library, value_sets)
    }

    /// Create a processor with the default configuration
    pub fn new<E>(
        engine: &E,
        library: ElmLibrary,
        value_sets: ValueSetCache,
        parameters: Option<Parameters>,
        dependencies: IndexMap<String, ElmLibrary>,
        listener: Option<Arc<dyn MessageListener>>,
    ) -> ProcessorResult<Self>
    where
        E: EvaluationEngine + ?Sized,
    {
        let mut builder = Self::builder(library, value_sets)
            .parameters(parameters)
            .dependencies(dependencies);
        if let Some(listener) = listener {
            builder = builder.message_listener(listener);
        }
        builder.build(engine)
    }

    /// Replace the loaded patient data with `bundle`
    ///
    /// The bundle must contain exactly one Patient resource with an id.
    /// If it does not, nothing changes and the previous bundle stays loaded.
    pub fn load_bundle(&mut self, bundle: Bundle) -> ProcessorResult<()> {
        let patient_id = bundle.patient_id()?.to_string();

        self.source.reset();
        self.source.load_bundles(vec![bundle]);

        log::debug!("Loaded bundle for patient {}", patient_id);
        self.patient_id = Some(patient_id);
        Ok(())
    }

    /// Parse a bundle from JSON and load it
    pub fn load_bundle_json(&mut self, json: &str) -> ProcessorResult<()> {
        self.load_bundle(Bundle::from_json(json)?)
    }

    /// Evaluate `target` for the loaded patient
    ///
    /// Returns `Ok(None)` without calling the engine when no bundle is
    /// loaded. `execution_date_time` is an ISO 8601 string; when absent the
    /// engine evaluates as of its own current time.
    pub async fn evaluate(
        &mut self,
        target: &EvaluationTarget,
        execution_date_time: Option<&str>,
    ) -> ProcessorResult<Option<Evaluation>> {
        if !self.source.is_loaded() {
            log::trace!("No bundle loaded, skipping evaluation of {:?}", target);
            return Ok(None);
        }
        let Some(patient_id) = self.patient_id.clone() else {
            return Ok(None);
        };

        let at = execution_date_time
            .map(ExecutionDateTime::parse)
            .transpose()?;

        match target {
            EvaluationTarget::Library => {
                log::trace!("Evaluating library {} for {}", self.library.name(), patient_id);
                let results = self.executor.exec(self.source.as_mut(), at.as_ref()).await?;
                Ok(results.into_patient(&patient_id).map(Evaluation::Library))
            }
            EvaluationTarget::Expression(name) => {
                log::trace!("Evaluating expression '{}' for {}", name, patient_id);
                let results = {
                    let mut source = RewindGuard::new(self.source.as_mut());
                    self.executor
                        .exec_expression(name, &mut *source, at.as_ref())
                        .await?
                };
                Ok(results
                    .into_patient(&patient_id)
                    .and_then(|mut values| values.shift_remove(name))
                    .map(Evaluation::Expression))
            }
        }
    }

    /// Evaluate a named expression, or the whole library for [`EVALUATE_LIBRARY`]
    ///
    /// For the whole library the value is a JSON object keyed by expression name.
    pub async fn evaluate_expression(
        &mut self,
        expression: &str,
        execution_date_time: Option<&str>,
    ) -> ProcessorResult<Option<Value>> {
        let target = EvaluationTarget::from_name(expression);
        let evaluation = self.evaluate(&target, execution_date_time).await?;
        Ok(evaluation.map(Evaluation::into_value))
    }

    /// Evaluate the whole library
    pub async fn evaluate_library(
        &mut self,
        execution_date_time: Option<&str>,
    ) -> ProcessorResult<Option<PatientResults>> {
        let evaluation = self
            .evaluate(&EvaluationTarget::Library, execution_date_time)
            .await?;
        Ok(evaluation.and_then(Evaluation::into_library))
    }

    /// Id of the loaded patient
    pub fn patient_id(&self) -> Option<&str> {
        self.patient_id.as_deref()
    }

    /// Whether a bundle is loaded
    pub fn is_loaded(&self) -> bool {
        self.source.is_loaded()
    }

    /// The main library
    pub fn library(&self) -> &ElmLibrary {
        &self.library
    }

    /// Libraries available to the main library
    pub fn repository(&self) -> &LibraryRepository {
        &self.repository
    }

    pub fn message_listener(&self) -> Option<&Arc<dyn MessageListener>> {
        self.listener.as_ref()
    }

    pub fn patient_source(&self) -> &dyn PatientSource {
        self.source.as_ref()
    }
}
