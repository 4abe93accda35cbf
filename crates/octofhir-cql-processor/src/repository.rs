//! Named library repository
//!
//! Holds the libraries a main library may `include`, keyed by name. The
//! processor seeds it with the FHIRHelpers helper library before adding the
//! caller's dependencies, so an explicit `FHIRHelpers` dependency replaces the
//! bundled one.

use crate::elm::{ElmLibrary, IncludeDef};
use crate::error::{ProcessorError, ProcessorResult};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

/// Name under which the helper library is registered
pub const FHIR_HELPERS: &str = "FHIRHelpers";

/// FHIRHelpers 4.0.1: conversions from FHIR primitives, enumerations,
/// Coding, CodeableConcept, Quantity, Ratio, Range and Period to CQL
/// system types
const FHIR_HELPERS_ELM: &str = include_str!("../resources/FHIRHelpers-4.0.1.json");

/// Libraries available for `include` resolution, by name
#[derive(Debug, Clone, Default)]
pub struct LibraryRepository {
    libraries: IndexMap<String, ElmLibrary>,
}

impl LibraryRepository {
    /// Empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository holding only the bundled FHIRHelpers library
    pub fn with_fhir_helpers() -> ProcessorResult<Self> {
        let mut repository = Self::new();
        repository.insert(FHIR_HELPERS, Self::fhir_helpers()?);
        Ok(repository)
    }

    /// The bundled FHIRHelpers 4.0.1 library
    pub fn fhir_helpers() -> ProcessorResult<ElmLibrary> {
        ElmLibrary::from_json(FHIR_HELPERS_ELM)
    }

    /// Register a library under `name`, returning the one it replaced
    pub fn insert(&mut self, name: impl Into<String>, library: ElmLibrary) -> Option<ElmLibrary> {
        let name = name.into();
        log::debug!("Registering library {} as '{}'", library.identifier(), name);
        self.libraries.insert(name, library)
    }

    /// Register every `*.json` ELM file in `dir` under its library id
    ///
    /// Returns the number of libraries registered. Files are visited in name
    /// order so later duplicates win deterministically.
    pub fn load_directory(&mut self, dir: &Path) -> ProcessorResult<usize> {
        let io_err = |source| ProcessorError::LibraryIo {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let library = ElmLibrary::from_path(path)?;
            let name = library.name().to_string();
            if self.insert(name.clone(), library).is_some() && name == FHIR_HELPERS {
                log::warn!("{} replaces the registered '{}' library", path.display(), name);
            }
        }

        Ok(paths.len())
    }

    /// Library registered under `name`
    pub fn get(&self, name: &str) -> Option<&ElmLibrary> {
        self.libraries.get(name)
    }

    /// Library satisfying an include definition
    ///
    /// A version mismatch only fails when both sides declare a version.
    pub fn resolve(&self, include: &IncludeDef) -> Option<&ElmLibrary> {
        let library = self.get(&include.path)?;
        match (include.version.as_deref(), library.version()) {
            (Some(wanted), Some(found)) if wanted != found => None,
            _ => Some(library),
        }
    }

    /// Includes of `library` that this repository cannot satisfy
    pub fn unresolved_includes<'a>(&self, library: &'a ElmLibrary) -> Vec<&'a IncludeDef> {
        library
            .includes()
            .iter()
            .filter(|include| self.resolve(include).is_none())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.libraries.contains_key(name)
    }

    /// Registered names, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.libraries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ElmLibrary)> {
        self.libraries.iter().map(|(name, lib)| (name.as_str(), lib))
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}
