//! Value-set cache handed to the engine's terminology service

use crate::error::{ProcessorError, ProcessorResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A code listed in a value-set expansion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetCode {
    pub code: String,
    pub system: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl ValueSetCode {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: system.into(),
            version: None,
            display: None,
        }
    }
}

/// Pre-expanded value sets keyed by OID, then by value-set version
///
/// Serialized form: `{"<oid>": {"<version>": [{"code": .., "system": ..}]}}`.
/// The processor never looks inside; membership checks belong to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueSetCache {
    value_sets: IndexMap<String, IndexMap<String, Vec<ValueSetCode>>>,
}

impl ValueSetCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value
    pub fn from_value(value: Value) -> ProcessorResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| ProcessorError::invalid_value_set_cache(e.to_string()))
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> ProcessorResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Add an expansion
    pub fn insert(
        &mut self,
        oid: impl Into<String>,
        version: impl Into<String>,
        codes: Vec<ValueSetCode>,
    ) {
        self.value_sets
            .entry(oid.into())
            .or_default()
            .insert(version.into(), codes);
    }

    /// Expansion for an exact OID and version
    pub fn get(&self, oid: &str, version: &str) -> Option<&[ValueSetCode]> {
        self.value_sets
            .get(oid)
            .and_then(|versions| versions.get(version))
            .map(Vec::as_slice)
    }

    /// All versions held for an OID
    pub fn versions(&self, oid: &str) -> impl Iterator<Item = (&str, &[ValueSetCode])> {
        self.value_sets
            .get(oid)
            .into_iter()
            .flatten()
            .map(|(version, codes)| (version.as_str(), codes.as_slice()))
    }

    /// OIDs in insertion order
    pub fn oids(&self) -> impl Iterator<Item = &str> {
        self.value_sets.keys().map(String::as_str)
    }

    /// Number of distinct OIDs
    pub fn len(&self) -> usize {
        self.value_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value_sets.is_empty()
    }
}
