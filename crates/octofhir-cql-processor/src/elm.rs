//! Compiled CQL libraries (ELM JSON)
//!
//! The processor treats ELM as opaque: the full document is kept as JSON and
//! handed to the engine untouched. Only the header fields needed to register
//! and wire libraries are read here.

use crate::error::{ProcessorError, ProcessorResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Library identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionedIdentifier {
    /// Identifier
    pub id: String,
    /// System/namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl fmt::Display for VersionedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} version '{}'", self.id, version),
            None => f.write_str(&self.id),
        }
    }
}

/// Include definition from the library header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeDef {
    /// Local identifier
    pub local_identifier: String,
    /// Library path
    pub path: String,
    /// Library version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A compiled CQL library in ELM JSON form
///
/// Cloning is cheap: the document is shared.
#[derive(Debug, Clone)]
pub struct ElmLibrary {
    identifier: VersionedIdentifier,
    includes: Vec<IncludeDef>,
    document: Arc<Value>,
}

impl ElmLibrary {
    /// Wrap an ELM JSON document
    ///
    /// The document must have the `{"library": {"identifier": {"id": ...}}}` shape.
    pub fn from_value(document: Value) -> ProcessorResult<Self> {
        let library = document
            .get("library")
            .and_then(Value::as_object)
            .ok_or_else(|| ProcessorError::invalid_library("missing 'library' object"))?;

        let identifier = library
            .get("identifier")
            .ok_or_else(|| ProcessorError::invalid_library("missing 'library.identifier'"))?;
        let identifier: VersionedIdentifier = serde_json::from_value(identifier.clone())
            .map_err(|e| ProcessorError::invalid_library(format!("bad identifier: {}", e)))?;

        let includes = match library.get("includes").and_then(|i| i.get("def")) {
            Some(defs) => serde_json::from_value(defs.clone()).map_err(|e| {
                ProcessorError::invalid_library(format!(
                    "bad includes in {}: {}",
                    identifier.id, e
                ))
            })?,
            None => Vec::new(),
        };

        Ok(Self {
            identifier,
            includes,
            document: Arc::new(document),
        })
    }

    /// Parse an ELM JSON string
    pub fn from_json(json: &str) -> ProcessorResult<Self> {
        let document: Value = serde_json::from_str(json)?;
        Self::from_value(document)
    }

    /// Read an ELM JSON file
    pub fn from_path(path: &Path) -> ProcessorResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ProcessorError::LibraryIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Library identifier
    pub fn identifier(&self) -> &VersionedIdentifier {
        &self.identifier
    }

    /// Library name (`identifier.id`)
    pub fn name(&self) -> &str {
        &self.identifier.id
    }

    /// Library version, if declared
    pub fn version(&self) -> Option<&str> {
        self.identifier.version.as_deref()
    }

    /// Libraries this one includes
    pub fn includes(&self) -> &[IncludeDef] {
        &self.includes
    }

    /// Names of the statements defined in this library, in declaration order
    pub fn statement_names(&self) -> Vec<&str> {
        self.statements()
            .filter_map(|def| def.get("name").and_then(Value::as_str))
            .collect()
    }

    /// Raw statement definition by name
    pub fn statement(&self, name: &str) -> Option<&Value> {
        self.statements()
            .find(|def| def.get("name").and_then(Value::as_str) == Some(name))
    }

    /// The full ELM document
    pub fn json(&self) -> &Value {
        &self.document
    }

    fn statements(&self) -> impl Iterator<Item = &Value> {
        self.document
            .pointer("/library/statements/def")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }
}
