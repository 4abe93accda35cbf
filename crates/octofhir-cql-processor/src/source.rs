//! Patient-data adapter
//!
//! A [`PatientSource`] holds loaded bundles and a cursor over the patients in
//! them. Engines walk the cursor with [`current_patient`](PatientSource::current_patient)
//! and [`next_patient`](PatientSource::next_patient); the processor only
//! resets, loads, checks for loaded data, and rewinds.

use crate::bundle::{Bundle, resource_type_of};
use serde_json::Value;

/// Source of patient data consumed by the engine
pub trait PatientSource: Send {
    /// Drop every loaded bundle and derived state, and reset the cursor
    fn reset(&mut self);

    /// Load bundles, one patient per bundle
    fn load_bundles(&mut self, bundles: Vec<Bundle>);

    /// Whether any bundle is loaded
    fn is_loaded(&self) -> bool;

    /// Patient under the cursor
    fn current_patient(&self) -> Option<PatientRecord<'_>>;

    /// Advance the cursor and return the patient under it
    fn next_patient(&mut self) -> Option<PatientRecord<'_>>;

    /// Move the cursor back to the first patient
    fn rewind(&mut self);

    /// Data model version label (e.g. FHIR `4.0.1`)
    fn model_version(&self) -> &str;
}

/// Borrowed view over one patient's bundle
#[derive(Debug, Clone, Copy)]
pub struct PatientRecord<'a> {
    bundle: &'a Bundle,
}

impl<'a> PatientRecord<'a> {
    pub fn new(bundle: &'a Bundle) -> Self {
        Self { bundle }
    }

    /// The Patient resource, if the bundle has one
    pub fn patient(&self) -> Option<&'a Value> {
        self.bundle.resources_of_type("Patient").next()
    }

    /// Patient id
    pub fn id(&self) -> Option<&'a str> {
        self.patient()
            .and_then(|p| p.get("id"))
            .and_then(Value::as_str)
    }

    /// Resources of the given type belonging to this patient
    pub fn find_records(&self, resource_type: &str) -> Vec<&'a Value> {
        self.bundle
            .resources()
            .filter(|r| resource_type_of(r) == Some(resource_type))
            .collect()
    }

    /// Every resource in the patient's bundle
    pub fn resources(&self) -> impl Iterator<Item = &'a Value> + 'a {
        self.bundle.resources()
    }

    pub fn bundle(&self) -> &'a Bundle {
        self.bundle
    }
}

/// In-memory patient source over FHIR bundles
#[derive(Debug, Clone)]
pub struct BundlePatientSource {
    model_version: String,
    bundles: Vec<Bundle>,
    index: usize,
}

impl BundlePatientSource {
    /// Source labelled with the given FHIR version
    pub fn new(model_version: impl Into<String>) -> Self {
        Self {
            model_version: model_version.into(),
            bundles: Vec::new(),
            index: 0,
        }
    }

    /// Source for FHIR R4 (4.0.1) data
    pub fn fhir_v401() -> Self {
        Self::new("4.0.1")
    }

    /// Number of loaded bundles
    pub fn bundle_count(&self) -> usize {
        self.bundles.len()
    }

    /// Cursor position
    pub fn position(&self) -> usize {
        self.index
    }
}

impl Default for BundlePatientSource {
    fn default() -> Self {
        Self::fhir_v401()
    }
}

impl PatientSource for BundlePatientSource {
    fn reset(&mut self) {
        self.bundles = Vec::new();
        self.index = 0;
    }

    fn load_bundles(&mut self, bundles: Vec<Bundle>) {
        self.bundles.extend(bundles);
    }

    fn is_loaded(&self) -> bool {
        !self.bundles.is_empty()
    }

    fn current_patient(&self) -> Option<PatientRecord<'_>> {
        self.bundles.get(self.index).map(PatientRecord::new)
    }

    fn next_patient(&mut self) -> Option<PatientRecord<'_>> {
        if self.index < self.bundles.len() {
            self.index += 1;
        }
        self.current_patient()
    }

    fn rewind(&mut self) {
        self.index = 0;
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}
