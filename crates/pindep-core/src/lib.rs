//! Core resolution engine for pindep.
//!
//! This crate ties the schema, cache, and remote layers together: the
//! `Resolver` expands a manifest's pinned requirements into a package graph and
//! selects (or builds) a binary for each node, the generators render CMake
//! descriptors from the result, and `output` writes them all-or-nothing. The
//! `Engine` is the facade the CLI drives.

pub mod builder;
pub mod concurrency;
pub mod config;
pub mod engine;
pub mod generators;
pub mod output;
pub mod resolver;

pub use builder::{BuildContext, CommandBuilder, PackageBuilder};
pub use concurrency::{install_signal_handler, shutdown_requested};
pub use config::{BuildPolicy, PindepConfig, PindepHome, CONFIG_FILE};
pub use engine::{Engine, InstallReport, InstallRequest, LockReport, PackageSummary, ResolveRequest};
pub use generators::{render_all, Generator, RenderedFile};
pub use output::write_descriptors;
pub use resolver::{PackageOrigin, Resolution, ResolveOptions, ResolvedPackage, Resolver};

use pindep_schema::{
    LockError, ManifestError, PackageId, PackageName, PackageRef, ProfileError, RecipeError,
    SettingName, Settings, SettingsError, Version,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unresolved dependency: no recipe for {reference}{}", required_by_suffix(.required_by.as_ref()))]
    UnresolvedDependency {
        reference: PackageRef,
        required_by: Option<PackageRef>,
    },
    #[error(
        "incompatible settings: no binary of {reference} for [{settings}] (package id {})",
        .package_id.short()
    )]
    IncompatibleSettings {
        reference: PackageRef,
        package_id: PackageId,
        settings: Settings,
    },
    #[error("generator error: {0}")]
    Generator(String),
    #[error("malformed manifest: {0}")]
    MalformedManifest(ManifestError),
    #[error("setting '{setting}' is not set{}; use a profile or -s {setting}=<value>", required_by_suffix(.required_by.as_ref()))]
    MissingSetting {
        setting: SettingName,
        required_by: Option<PackageRef>,
    },
    #[error("version conflict for '{name}': {first_version} (required by {first_by}) vs {second_version} (required by {second_by})")]
    VersionConflict {
        name: PackageName,
        first_version: Version,
        first_by: String,
        second_version: Version,
        second_by: String,
    },
    #[error("dependency cycle: {}", format_cycle(.0))]
    DependencyCycle(Vec<PackageName>),
    #[error("build of {reference} failed: {reason}")]
    BuildFailed { reference: PackageRef, reason: String },
    #[error("lock mismatch: {0}")]
    LockMismatch(#[from] LockError),
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),
    #[error("invalid setting: {0}")]
    Settings(#[from] SettingsError),
    #[error("recipe error: {0}")]
    Recipe(#[from] RecipeError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cache error: {0}")]
    Cache(#[from] pindep_cache::CacheError),
    #[error("remote error: {0}")]
    Remote(#[from] pindep_remote::RemoteError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("interrupted")]
    Interrupted,
}

impl From<ManifestError> for CoreError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::UnknownGenerator(name) => {
                CoreError::Generator(format!("unknown generator '{name}'"))
            }
            other => CoreError::MalformedManifest(other),
        }
    }
}

fn required_by_suffix(required_by: Option<&PackageRef>) -> String {
    required_by
        .map(|r| format!(" (required by {r})"))
        .unwrap_or_default()
}

fn format_cycle(names: &[PackageName]) -> String {
    let mut parts: Vec<String> = names.iter().map(ToString::to_string).collect();
    if let Some(first) = names.first() {
        parts.push(first.to_string());
    }
    parts.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_generator_maps_to_generator_error() {
        let err: CoreError = ManifestError::UnknownGenerator("Bazel".to_owned()).into();
        assert!(matches!(err, CoreError::Generator(_)));
        assert!(err.to_string().contains("Bazel"));
    }

    #[test]
    fn other_manifest_errors_are_malformed() {
        let err: CoreError = ManifestError::UnsupportedVersion(2).into();
        assert!(matches!(err, CoreError::MalformedManifest(_)));
    }

    #[test]
    fn cycle_display_closes_loop() {
        let err = CoreError::DependencyCycle(vec![
            PackageName::parse("a").unwrap(),
            PackageName::parse("b").unwrap(),
        ]);
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }

    #[test]
    fn unresolved_display_mentions_requirer() {
        let err = CoreError::UnresolvedDependency {
            reference: "sfml/99.0.0".parse().unwrap(),
            required_by: None,
        };
        assert_eq!(err.to_string(), "unresolved dependency: no recipe for sfml/99.0.0");

        let err = CoreError::UnresolvedDependency {
            reference: "abseil/20230125.3".parse().unwrap(),
            required_by: Some("grpc/1.54.3".parse().unwrap()),
        };
        assert!(err.to_string().ends_with("(required by grpc/1.54.3)"));
    }
}
