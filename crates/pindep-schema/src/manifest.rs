use crate::reference::ReferenceError;
use crate::settings::SettingsError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default manifest file name looked up in a project directory.
pub const MANIFEST_FILE: &str = "pindep.toml";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported manifest_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("invalid settings declaration: {0}")]
    Settings(#[from] SettingsError),
    #[error("setting '{0}' is declared more than once")]
    DuplicateSetting(String),
    #[error("invalid requirement: {0}")]
    Requirement(#[from] ReferenceError),
    #[error("package '{name}' is required more than once ('{first}' and '{second}')")]
    DuplicateRequirement {
        name: String,
        first: String,
        second: String,
    },
    #[error("unknown generator '{0}' (expected one of: CMakeDeps, CMakeToolchain)")]
    UnknownGenerator(String),
}

/// Raw manifest as written in `pindep.toml`.
///
/// `settings` and `requires` are mandatory declarations even when empty.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ManifestV1 {
    pub manifest_version: u32,
    pub settings: Vec<String>,
    #[serde(default)]
    pub generators: Vec<String>,
    pub requires: Vec<String>,
}

pub fn parse_manifest_str(input: &str) -> Result<ManifestV1, ManifestError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<ManifestV1, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}
