//! Package cache for pindep.
//!
//! This crate provides the storage layer behind resolution: the `PackageCache`
//! trait that the resolver receives as an explicit handle, the on-disk
//! `DiskCache` (atomic writes, per-package file locks, format versioning),
//! the in-memory `MemoryCache` used in tests, `CacheLayout` for directory
//! structure, and deterministic package archives for remote transfer.

pub mod archive;
pub mod disk;
pub mod layout;
pub mod lock;
pub mod memory;

pub use archive::{archive_digest, pack_package, unpack_package};
pub use disk::DiskCache;
pub use layout::{CacheLayout, CACHE_FORMAT_VERSION};
pub use lock::PackageLock;
pub use memory::MemoryCache;

use pindep_schema::{CppInfo, PackageId, PackageRef, Recipe, RecipeError, RecipeRevision, Settings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = fs::File::open(dir)?;
    f.sync_all()
}

/// Recursively copy the contents of `from` into `to`, creating `to`.
pub fn copy_tree(from: &Path, to: &Path) -> Result<(), std::io::Error> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let src = entry.path();
        let dest = to.join(entry.file_name());
        let ft = entry.file_type()?;
        if ft.is_dir() {
            copy_tree(&src, &dest)?;
        } else if ft.is_file() {
            fs::copy(&src, &dest)?;
        } else if ft.is_symlink() {
            let target = fs::read_link(&src)?;
            copy_symlink(&target, &dest)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(target: &Path, dest: &Path) -> Result<(), std::io::Error> {
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(not(unix))]
fn copy_symlink(target: &Path, dest: &Path) -> Result<(), std::io::Error> {
    fs::copy(target, dest).map(|_| ())
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache recipe error: {0}")]
    Recipe(#[from] RecipeError),
    #[error("cache metadata parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cache metadata serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not in cache: {0}")]
    NotFound(String),
    #[error("corrupt cache entry {path}: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("cache format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("archive digest mismatch for {key}: expected {expected}, got {actual}")]
    IntegrityFailure {
        key: String,
        expected: String,
        actual: String,
    },
}

/// Metadata stored next to a binary package as `package.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinaryInfo {
    pub reference: PackageRef,
    pub package_id: PackageId,
    pub recipe_revision: RecipeRevision,
    #[serde(default)]
    pub requires: Vec<PackageRef>,
    /// Blake3 digest of the package archive, set once the package is packed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Settings key the binary was produced for.
    pub settings: Settings,
    pub cpp_info: CppInfo,
}

impl BinaryInfo {
    pub fn to_toml(&self) -> Result<String, CacheError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn from_toml(input: &str) -> Result<Self, CacheError> {
        Ok(toml::from_str(input)?)
    }
}

/// A binary present in a cache, with the absolute folder consumers link against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPackage {
    pub info: BinaryInfo,
    pub folder: PathBuf,
}

/// One recipe in a cache listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CachedRecipe {
    pub reference: PackageRef,
    pub revision: RecipeRevision,
    pub binaries: Vec<PackageId>,
}

/// The cache handle the resolver is given.
///
/// Implementations serialize their own writes; readers may observe a recipe
/// or binary only once it is completely stored.
pub trait PackageCache: Send + Sync {
    /// Recipe for an exact reference, if cached.
    fn recipe(&self, reference: &PackageRef) -> Result<Option<Recipe>, CacheError>;

    /// Folder holding files exported with the recipe, if the cache keeps any.
    fn export_folder(&self, reference: &PackageRef) -> Option<PathBuf>;

    /// Store a recipe, replacing any previous one for the same reference.
    /// `export_from` is copied as the recipe's exported files.
    fn put_recipe(&self, recipe: &Recipe, export_from: Option<&Path>) -> Result<(), CacheError>;

    fn binary(
        &self,
        reference: &PackageRef,
        package_id: &PackageId,
    ) -> Result<Option<BinaryPackage>, CacheError>;

    /// Move a staged package folder into the cache and record its metadata.
    /// `staged` must live under [`staging_dir`](Self::staging_dir).
    fn install_binary(
        &self,
        info: BinaryInfo,
        staged: Option<&Path>,
    ) -> Result<BinaryPackage, CacheError>;

    /// Fresh scratch directory on the same filesystem as the cache.
    fn staging_dir(&self) -> Result<tempfile::TempDir, CacheError>;

    fn list(&self) -> Result<Vec<CachedRecipe>, CacheError>;

    /// Remove a reference's binaries, and its recipe unless `binaries_only`.
    /// Returns the number of binaries removed.
    fn remove(&self, reference: &PackageRef, binaries_only: bool) -> Result<usize, CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pindep_schema::SettingName;

    fn sample_info() -> BinaryInfo {
        BinaryInfo {
            reference: "grpc/1.54.3".parse().unwrap(),
            package_id: PackageId::new("a".repeat(64)),
            recipe_revision: RecipeRevision::new("b".repeat(64)),
            requires: vec!["protobuf/3.21.12".parse().unwrap()],
            archive_digest: None,
            created_at: Some("2026-01-01T00:00:00+00:00".to_owned()),
            settings: Settings::new().with(SettingName::Os, "Linux").unwrap(),
            cpp_info: CppInfo::default(),
        }
    }

    #[test]
    fn binary_info_toml_roundtrip() {
        let info = sample_info();
        let text = info.to_toml().unwrap();
        assert!(text.contains("reference = \"grpc/1.54.3\""));
        assert_eq!(BinaryInfo::from_toml(&text).unwrap(), info);
    }

    #[test]
    fn copy_tree_copies_nested_files() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/file.txt"), b"hello").unwrap();
        fs::write(src.path().join("top.txt"), b"top").unwrap();

        let dest = tempfile::tempdir().unwrap();
        let target = dest.path().join("copy");
        copy_tree(src.path(), &target).unwrap();
        assert_eq!(fs::read(target.join("a/b/file.txt")).unwrap(), b"hello");
        assert_eq!(fs::read(target.join("top.txt")).unwrap(), b"top");
    }

    #[test]
    fn cache_error_display_not_found() {
        let e = CacheError::NotFound("sfml/99.0.0".to_owned());
        assert!(e.to_string().contains("sfml/99.0.0"));
    }

    #[test]
    fn cache_error_display_version_mismatch() {
        let e = CacheError::VersionMismatch {
            expected: 1,
            found: 7,
        };
        let msg = e.to_string();
        assert!(msg.contains('1'));
        assert!(msg.contains('7'));
    }
}
