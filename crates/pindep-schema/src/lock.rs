use crate::normalize::NormalizedManifest;
use crate::reference::{PackageName, PackageRef, Version};
use crate::settings::Settings;
use crate::types::{PackageId, RecipeRevision};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default lock file name, written next to the manifest.
pub const LOCK_FILE: &str = "pindep.lock";
pub const LOCK_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock file parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("lock file serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unsupported lock_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("lock file lock_id mismatch: lock has '{lock_id}', recomputed '{computed_id}'")]
    LockIdMismatch {
        lock_id: String,
        computed_id: String,
    },
    #[error("lock file drift: {0}")]
    Drift(String),
}

/// One pinned node of the resolved graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct LockedPackage {
    pub name: PackageName,
    pub version: Version,
    pub recipe_revision: RecipeRevision,
    pub package_id: PackageId,
}

impl LockedPackage {
    pub fn reference(&self) -> PackageRef {
        PackageRef::new(self.name.clone(), self.version.clone())
    }
}

/// The lock file captures the fully resolved graph for one settings set.
///
/// `lock_id` is computed from the locked fields, so a hand-edited lock that
/// was not regenerated fails [`verify_integrity`](Self::verify_integrity).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockFile {
    pub lock_version: u32,
    pub lock_id: String,
    pub settings: Settings,
    #[serde(default)]
    pub packages: Vec<LockedPackage>,
}

impl LockFile {
    pub fn new(settings: Settings, mut packages: Vec<LockedPackage>) -> Self {
        packages.sort();
        let lock_id = compute_lock_id(&settings, &packages);
        Self {
            lock_version: LOCK_VERSION,
            lock_id,
            settings,
            packages,
        }
    }

    pub fn package(&self, name: &PackageName) -> Option<&LockedPackage> {
        self.packages.iter().find(|p| p.name == *name)
    }

    pub fn verify_integrity(&self) -> Result<(), LockError> {
        if self.lock_version != LOCK_VERSION {
            return Err(LockError::UnsupportedVersion(self.lock_version));
        }
        let computed = compute_lock_id(&self.settings, &self.packages);
        if computed != self.lock_id {
            return Err(LockError::LockIdMismatch {
                lock_id: self.lock_id.clone(),
                computed_id: computed,
            });
        }
        Ok(())
    }

    /// Check that every requirement the manifest declares is locked at the
    /// same exact version.
    pub fn verify_manifest_intent(&self, manifest: &NormalizedManifest) -> Result<(), LockError> {
        for req in &manifest.requires {
            match self.package(&req.name) {
                None => {
                    return Err(LockError::Drift(format!(
                        "'{req}' is in the manifest but not in the lock file. Run 'pindep lock' to re-resolve."
                    )));
                }
                Some(locked) if locked.version != req.version => {
                    return Err(LockError::Drift(format!(
                        "'{}' is locked at {} but the manifest requires {}",
                        req.name, locked.version, req.version
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Compare a freshly resolved lock against this one.
    pub fn verify_matches(&self, resolved: &LockFile) -> Result<(), LockError> {
        if self.settings != resolved.settings {
            return Err(LockError::Drift(format!(
                "settings changed: lock has '{}', resolved '{}'",
                self.settings, resolved.settings
            )));
        }
        for pkg in &resolved.packages {
            let Some(locked) = self.package(&pkg.name) else {
                return Err(LockError::Drift(format!(
                    "'{}' resolved but not present in the lock file",
                    pkg.reference()
                )));
            };
            if locked.version != pkg.version {
                return Err(LockError::Drift(format!(
                    "'{}' is locked at {} but resolved to {}",
                    pkg.name, locked.version, pkg.version
                )));
            }
            if locked.recipe_revision != pkg.recipe_revision {
                return Err(LockError::Drift(format!(
                    "recipe of '{}' changed: lock has revision {}, cache has {}",
                    pkg.reference(),
                    locked.recipe_revision.short(),
                    pkg.recipe_revision.short()
                )));
            }
        }
        for locked in &self.packages {
            if resolved.package(&locked.name).is_none() {
                return Err(LockError::Drift(format!(
                    "'{}' is locked but no longer part of the graph",
                    locked.reference()
                )));
            }
        }
        Ok(())
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), LockError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LockError::Io(e.error))?;
        // Fsync parent directory to ensure rename durability on power loss.
        if let Ok(f) = fs::File::open(dir) {
            let _ = f.sync_all();
        }
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

fn compute_lock_id(settings: &Settings, packages: &[LockedPackage]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (name, value) in settings.iter() {
        hasher.update(format!("setting:{name}={value}\n").as_bytes());
    }
    for pkg in packages {
        hasher.update(
            format!(
                "pkg:{}/{}#{}:{}\n",
                pkg.name, pkg.version, pkg.recipe_revision, pkg.package_id
            )
            .as_bytes(),
        );
    }
    hasher.finalize().to_hex().to_string()
}
