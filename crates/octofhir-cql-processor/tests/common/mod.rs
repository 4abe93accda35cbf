//! Common test utilities for processor testing
//!
//! - A scriptable mock engine implementing `EvaluationEngine`
//! - Builders for ELM libraries and patient bundles

#![allow(dead_code)]

pub mod fhir_data;
pub mod mocks;

pub use fhir_data::*;
pub use mocks::*;
