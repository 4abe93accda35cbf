//! Processor configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable with extra ELM library directories, `:` separated
pub const LIBRARY_PATH_ENV: &str = "CQL_LIBRARY_PATH";

/// Configuration for assembling a processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// FHIR version label for the default patient source
    #[serde(default = "default_fhir_version")]
    pub fhir_version: String,

    /// Directories of ELM JSON dependency libraries
    #[serde(default)]
    pub library_paths: Vec<PathBuf>,

    /// Also read directories from `CQL_LIBRARY_PATH`
    #[serde(default)]
    pub use_library_path_env: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            fhir_version: default_fhir_version(),
            library_paths: Vec::new(),
            use_library_path_env: false,
        }
    }
}

impl ProcessorConfig {
    /// Configured directories followed by those from `CQL_LIBRARY_PATH`
    pub fn library_search_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.library_paths.clone();

        if self.use_library_path_env {
            if let Ok(env_path) = std::env::var(LIBRARY_PATH_ENV) {
                paths.extend(split_library_path(&env_path));
            }
        }

        paths
    }
}

fn split_library_path(value: &str) -> impl Iterator<Item = PathBuf> + '_ {
    value
        .split(':')
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

fn default_fhir_version() -> String {
    "4.0.1".to_string()
}
