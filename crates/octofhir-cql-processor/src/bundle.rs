//! FHIR bundles of patient data
//!
//! Resources stay raw JSON. Only `resourceType` and the Patient `id` are read
//! by the processor; everything else is for the engine.

use crate::error::{ProcessorError, ProcessorResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A FHIR Bundle holding one patient's resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default = "bundle_resource_type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub bundle_type: Option<String>,
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

/// One bundle entry wrapping a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(default)]
    pub resource: Value,
}

fn bundle_resource_type() -> String {
    "Bundle".to_string()
}

impl Default for Bundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Bundle {
    /// Empty collection bundle
    pub fn new() -> Self {
        Self {
            resource_type: bundle_resource_type(),
            id: None,
            bundle_type: Some("collection".to_string()),
            entry: Vec::new(),
        }
    }

    /// Append a resource
    pub fn with_resource(mut self, resource: Value) -> Self {
        self.entry.push(BundleEntry {
            full_url: None,
            resource,
        });
        self
    }

    /// Build from a JSON value, checking that it is a Bundle
    pub fn from_value(value: Value) -> ProcessorResult<Self> {
        let bundle: Bundle = serde_json::from_value(value)
            .map_err(|e| ProcessorError::invalid_bundle(e.to_string()))?;
        if bundle.resource_type != "Bundle" {
            return Err(ProcessorError::invalid_bundle(format!(
                "expected resourceType 'Bundle', found '{}'",
                bundle.resource_type
            )));
        }
        Ok(bundle)
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> ProcessorResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// All resources, in entry order
    pub fn resources(&self) -> impl Iterator<Item = &Value> {
        self.entry.iter().map(|e| &e.resource)
    }

    /// Resources with the given `resourceType`
    pub fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Value> {
        self.resources()
            .filter(move |r| resource_type_of(r) == Some(resource_type))
    }

    /// The single Patient resource
    ///
    /// Zero Patients, more than one Patient, or a Patient without `id` are errors.
    pub fn patient(&self) -> ProcessorResult<&Value> {
        let patients: Vec<&Value> = self.resources_of_type("Patient").collect();
        match patients.as_slice() {
            [] => Err(ProcessorError::MissingPatient),
            [patient] => {
                if patient.get("id").and_then(Value::as_str).is_none() {
                    return Err(ProcessorError::MissingPatientId);
                }
                Ok(*patient)
            }
            many => Err(ProcessorError::MultiplePatients {
                ids: many
                    .iter()
                    .map(|p| p.get("id").and_then(Value::as_str).unwrap_or("<no id>").to_string())
                    .collect(),
            }),
        }
    }

    /// Id of the single Patient resource
    pub fn patient_id(&self) -> ProcessorResult<&str> {
        let patient = self.patient()?;
        patient
            .get("id")
            .and_then(Value::as_str)
            .ok_or(ProcessorError::MissingPatientId)
    }
}

/// `resourceType` of a raw resource
pub fn resource_type_of(resource: &Value) -> Option<&str> {
    resource.get("resourceType").and_then(Value::as_str)
}
