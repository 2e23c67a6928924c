//! Manifest parsing, settings, recipes, profiles, package identity, and lock files for pindep.
//!
//! This crate defines the schema layer: TOML manifest parsing (`ManifestV1`),
//! the validated `NormalizedManifest`, pinned `name/version` references, the
//! settings record and its stored `Profile` defaults, cache `Recipe`s,
//! deterministic binary identity (`compute_package_id`), and lock file
//! generation/verification (`LockFile`).

pub mod generator;
pub mod identity;
pub mod lock;
pub mod manifest;
pub mod normalize;
pub mod profile;
pub mod recipe;
pub mod reference;
pub mod settings;
pub mod types;

pub use generator::GeneratorKind;
pub use identity::compute_package_id;
pub use lock::{LockError, LockFile, LockedPackage, LOCK_FILE};
pub use manifest::{parse_manifest_file, parse_manifest_str, ManifestError, ManifestV1, MANIFEST_FILE};
pub use normalize::NormalizedManifest;
pub use profile::{detect_host, detect_with, parse_profile_str, Profile, ProfileError, DEFAULT_PROFILE};
pub use recipe::{
    parse_recipe_file, parse_recipe_str, BuildSection, CppInfo, Recipe, RecipeError, RECIPE_FILE,
};
pub use reference::{PackageName, PackageRef, ReferenceError, Version};
pub use settings::{SettingName, Settings, SettingsError};
pub use types::{PackageId, RecipeRevision, ShortId};
