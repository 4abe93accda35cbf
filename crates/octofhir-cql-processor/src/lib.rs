//! CQL processor
//!
//! Runs a compiled CQL library (ELM JSON) against the FHIR bundle of a single
//! patient. The crate does not interpret CQL itself: it assembles the library,
//! its dependencies and a value-set cache, hands them to an external
//! [`EvaluationEngine`], loads the patient's bundle into a [`PatientSource`],
//! and narrows the engine's results down to that one patient.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_cql_processor::{ElmLibrary, Processor, ValueSetCache};
//! use octofhir_cql_messages::MessageSink;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MessageSink::new());
//! let mut processor = Processor::builder(ElmLibrary::from_json(elm)?, ValueSetCache::from_json(vs)?)
//!     .message_listener(sink.clone())
//!     .build(&engine)?;
//!
//! processor.load_bundle_json(bundle)?;
//! let adult = processor.evaluate_expression("Is18OrOlder", Some("2024-01-01")).await?;
//! let all = processor.evaluate_library(None).await?;
//! ```
//!
//! # Architecture
//!
//! - [`Processor`]: owns the bound executor, the patient source and the active patient id
//! - [`EvaluationEngine`] / [`CqlExecutor`]: the capabilities required from the engine
//! - [`PatientSource`] / [`BundlePatientSource`]: the patient-data adapter
//! - [`LibraryRepository`]: named dependency libraries, including the FHIRHelpers helper

pub mod bundle;
pub mod config;
pub mod datetime;
pub mod elm;
pub mod engine;
pub mod error;
pub mod processor;
pub mod repository;
pub mod source;
pub mod value_set;

pub use bundle::{Bundle, BundleEntry};
pub use config::ProcessorConfig;
pub use datetime::{DateTimePrecision, ExecutionDateTime};
pub use elm::{ElmLibrary, IncludeDef, VersionedIdentifier};
pub use engine::{
    CqlExecutor, EngineError, EngineResult, EvaluationEngine, ExecutionResults, ExecutorBinding,
    Parameters, PatientResults,
};
pub use error::{ProcessorError, ProcessorResult};
pub use processor::{EVALUATE_LIBRARY, Evaluation, EvaluationTarget, Processor, ProcessorBuilder};
pub use repository::LibraryRepository;
pub use source::{BundlePatientSource, PatientRecord, PatientSource};
pub use value_set::{ValueSetCache, ValueSetCode};

pub use octofhir_cql_messages::{Message, MessageListener, MessageSink, Severity};
