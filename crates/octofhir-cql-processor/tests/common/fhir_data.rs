//! ELM and FHIR test data builders

use octofhir_cql_processor::{Bundle, ElmLibrary, ValueSetCache, ValueSetCode};
use serde_json::{Value, json};

/// Builder for FHIR Patient resources
#[derive(Default)]
pub struct PatientBuilder {
    id: Option<String>,
    birth_date: Option<String>,
    gender: Option<String>,
}

impl PatientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn birth_date(mut self, date: impl Into<String>) -> Self {
        self.birth_date = Some(date.into());
        self
    }

    pub fn gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn build(self) -> Value {
        let mut patient = json!({"resourceType": "Patient"});
        if let Some(id) = self.id {
            patient["id"] = json!(id);
        }
        if let Some(birth_date) = self.birth_date {
            patient["birthDate"] = json!(birth_date);
        }
        if let Some(gender) = self.gender {
            patient["gender"] = json!(gender);
        }
        patient
    }
}

/// A Condition resource for `patient_id`
pub fn condition(id: &str, patient_id: &str, code: &str) -> Value {
    json!({
        "resourceType": "Condition",
        "id": id,
        "subject": {"reference": format!("Patient/{}", patient_id)},
        "code": {"coding": [{"system": "http://snomed.info/sct", "code": code}]}
    })
}

/// Bundle with one patient and the given extra resources
pub fn patient_bundle(id: &str, birth_date: &str, extra: Vec<Value>) -> Bundle {
    let mut bundle = Bundle::new().with_resource(PatientBuilder::new().id(id).birth_date(birth_date).build());
    for resource in extra {
        bundle = bundle.with_resource(resource);
    }
    bundle
}

/// ELM for a small age-check library including FHIRHelpers 4.0.1
pub fn age_library() -> ElmLibrary {
    ElmLibrary::from_value(json!({
        "library": {
            "identifier": {"id": "AgeCheck", "version": "1.0.0"},
            "schemaIdentifier": {"id": "urn:hl7-org:elm", "version": "r1"},
            "usings": {"def": [
                {"localIdentifier": "System", "uri": "urn:hl7-org:elm-types:r1"},
                {"localIdentifier": "FHIR", "uri": "http://hl7.org/fhir", "version": "4.0.1"}
            ]},
            "includes": {"def": [
                {"localIdentifier": "FHIRHelpers", "path": "FHIRHelpers", "version": "4.0.1"}
            ]},
            "parameters": {"def": [
                {"name": "MinimumAge", "accessLevel": "Public"}
            ]},
            "statements": {"def": [
                {"name": "Patient", "context": "Patient", "expression": {"type": "SingletonFrom"}},
                {"name": "Age", "context": "Patient", "accessLevel": "Public"},
                {"name": "Is18OrOlder", "context": "Patient", "accessLevel": "Public"},
                {"name": "ConditionCount", "context": "Patient", "accessLevel": "Public"}
            ]}
        }
    }))
    .expect("age library is valid ELM")
}

/// ELM for a library that includes `Common` 1.0.0 besides FHIRHelpers
pub fn library_with_common() -> ElmLibrary {
    ElmLibrary::from_value(json!({
        "library": {
            "identifier": {"id": "Screening", "version": "2.0.0"},
            "includes": {"def": [
                {"localIdentifier": "FHIRHelpers", "path": "FHIRHelpers", "version": "4.0.1"},
                {"localIdentifier": "Common", "path": "Common", "version": "1.0.0"}
            ]},
            "statements": {"def": [{"name": "InPopulation", "context": "Patient"}]}
        }
    }))
    .expect("screening library is valid ELM")
}

/// A dependency library with the given id and version
pub fn simple_library(id: &str, version: &str) -> ElmLibrary {
    ElmLibrary::from_value(json!({
        "library": {"identifier": {"id": id, "version": version}}
    }))
    .expect("simple library is valid ELM")
}

/// Value-set cache with a single diabetes value set
pub fn value_sets() -> ValueSetCache {
    let mut cache = ValueSetCache::new();
    cache.insert(
        "2.16.840.1.113883.3.464.1003.103.12.1001",
        "20190315",
        vec![ValueSetCode::new("http://snomed.info/sct", "44054006")],
    );
    cache
}
