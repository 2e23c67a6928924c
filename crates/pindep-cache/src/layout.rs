use crate::CacheError;
use pindep_schema::{PackageId, PackageRef};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Current cache format version. Incremented on incompatible layout changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";
const BINARY_INFO_FILE: &str = "package.toml";

/// Directory layout of a package cache.
///
/// ```text
/// <root>/version
/// <root>/recipes/<name>/<version>/recipe.toml
/// <root>/recipes/<name>/<version>/export/
/// <root>/packages/<name>/<version>/<package_id>/package.toml
/// <root>/packages/<name>/<version>/<package_id>/p/
/// <root>/staging/
/// <root>/locks/<name>-<version>.lock
/// ```
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheVersion {
    format_version: u32,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn recipes_dir(&self) -> PathBuf {
        self.root.join("recipes")
    }

    #[inline]
    pub fn recipe_dir(&self, reference: &PackageRef) -> PathBuf {
        self.recipes_dir()
            .join(reference.name.as_str())
            .join(reference.version.as_str())
    }

    #[inline]
    pub fn recipe_file(&self, reference: &PackageRef) -> PathBuf {
        self.recipe_dir(reference).join(pindep_schema::RECIPE_FILE)
    }

    #[inline]
    pub fn export_dir(&self, reference: &PackageRef) -> PathBuf {
        self.recipe_dir(reference).join("export")
    }

    #[inline]
    pub fn packages_root(&self) -> PathBuf {
        self.root.join("packages")
    }

    #[inline]
    pub fn packages_dir(&self, reference: &PackageRef) -> PathBuf {
        self.packages_root()
            .join(reference.name.as_str())
            .join(reference.version.as_str())
    }

    #[inline]
    pub fn binary_dir(&self, reference: &PackageRef, package_id: &PackageId) -> PathBuf {
        self.packages_dir(reference).join(package_id.as_str())
    }

    #[inline]
    pub fn binary_info_file(&self, reference: &PackageRef, package_id: &PackageId) -> PathBuf {
        self.binary_dir(reference, package_id).join(BINARY_INFO_FILE)
    }

    /// Folder consumers point their include and library paths at.
    #[inline]
    pub fn package_folder(&self, reference: &PackageRef, package_id: &PackageId) -> PathBuf {
        self.binary_dir(reference, package_id).join("p")
    }

    /// Scratch area for builds, downloads, and exports in progress.
    #[inline]
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    #[inline]
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    #[inline]
    pub fn package_lock(&self, reference: &PackageRef) -> PathBuf {
        self.locks_dir()
            .join(format!("{}-{}.lock", reference.name, reference.version))
    }

    pub fn initialize(&self) -> Result<(), CacheError> {
        fs::create_dir_all(self.recipes_dir())?;
        fs::create_dir_all(self.packages_root())?;
        fs::create_dir_all(self.staging_dir())?;
        fs::create_dir_all(self.locks_dir())?;

        let version_path = self.root.join(VERSION_FILE);
        if version_path.exists() {
            self.verify_version()?;
        } else {
            let ver = CacheVersion {
                format_version: CACHE_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            let mut tmp = NamedTempFile::new_in(&self.root)?;
            tmp.write_all(content.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&version_path)
                .map_err(|e| CacheError::Io(e.error))?;
            crate::fsync_dir(&self.root)?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), CacheError> {
        let version_path = self.root.join(VERSION_FILE);
        let content = fs::read_to_string(&version_path)?;
        let ver: CacheVersion = serde_json::from_str(&content)?;

        if ver.format_version != CACHE_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                expected: CACHE_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}
