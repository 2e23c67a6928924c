use crate::layout::CacheLayout;
use crate::lock::PackageLock;
use crate::{
    copy_tree, fsync_dir, BinaryInfo, BinaryPackage, CacheError, CachedRecipe, PackageCache,
};
use pindep_schema::{parse_recipe_file, PackageId, PackageName, PackageRef, Recipe, Version};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Package cache on the local filesystem, usually `$PINDEP_HOME/p`.
///
/// Every write goes through a temp file or staging directory on the same
/// filesystem followed by a rename, under the package's exclusive lock.
pub struct DiskCache {
    layout: CacheLayout,
}

impl DiskCache {
    /// Open (and create if needed) the cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let layout = CacheLayout::new(root);
        layout.initialize()?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    fn lock(&self, reference: &PackageRef) -> Result<PackageLock, CacheError> {
        PackageLock::acquire(&self.layout.package_lock(reference))
    }

    fn read_binary_info(
        &self,
        reference: &PackageRef,
        package_id: &PackageId,
    ) -> Result<Option<BinaryInfo>, CacheError> {
        let path = self.layout.binary_info_file(reference, package_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let info = BinaryInfo::from_toml(&content)?;
        if info.package_id != *package_id || info.reference != *reference {
            return Err(CacheError::Corrupt {
                path: path.display().to_string(),
                reason: format!(
                    "metadata describes {} {}",
                    info.reference,
                    info.package_id.short()
                ),
            });
        }
        Ok(Some(info))
    }

    fn binary_ids(&self, reference: &PackageRef) -> Result<Vec<PackageId>, CacheError> {
        let dir = self.layout.packages_dir(reference);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = PackageId::new(entry.file_name().to_string_lossy().into_owned());
            if self.layout.binary_info_file(reference, &id).exists() {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn write_atomic(dest: &Path, content: &[u8]) -> Result<(), CacheError> {
    let dir = dest
        .parent()
        .ok_or_else(|| CacheError::Io(std::io::Error::other("destination has no parent")))?;
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| CacheError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<String>, CacheError> {
    let mut names = Vec::new();
    if !dir.is_dir() {
        return Ok(names);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

impl PackageCache for DiskCache {
    fn recipe(&self, reference: &PackageRef) -> Result<Option<Recipe>, CacheError> {
        let path = self.layout.recipe_file(reference);
        if !path.exists() {
            return Ok(None);
        }
        let recipe = parse_recipe_file(&path)?;
        if recipe.reference() != *reference {
            return Err(CacheError::Corrupt {
                path: path.display().to_string(),
                reason: format!("recipe declares {}", recipe.reference()),
            });
        }
        Ok(Some(recipe))
    }

    fn export_folder(&self, reference: &PackageRef) -> Option<PathBuf> {
        let dir = self.layout.export_dir(reference);
        dir.is_dir().then_some(dir)
    }

    fn put_recipe(&self, recipe: &Recipe, export_from: Option<&Path>) -> Result<(), CacheError> {
        let reference = recipe.reference();
        let _lock = self.lock(&reference)?;
        let recipe_dir = self.layout.recipe_dir(&reference);
        fs::create_dir_all(&recipe_dir)?;

        let export_dir = self.layout.export_dir(&reference);
        if let Some(from) = export_from {
            let stage = self.staging_dir()?;
            let staged_export = stage.path().join("export");
            copy_tree(from, &staged_export)?;
            if export_dir.exists() {
                fs::remove_dir_all(&export_dir)?;
            }
            fs::rename(&staged_export, &export_dir)?;
        } else if export_dir.exists() {
            fs::remove_dir_all(&export_dir)?;
        }

        write_atomic(&self.layout.recipe_file(&reference), recipe.to_toml()?.as_bytes())?;
        debug!("stored recipe {reference} ({})", recipe.revision().short());
        Ok(())
    }

    fn binary(
        &self,
        reference: &PackageRef,
        package_id: &PackageId,
    ) -> Result<Option<BinaryPackage>, CacheError> {
        let Some(info) = self.read_binary_info(reference, package_id)? else {
            return Ok(None);
        };
        let folder = self.layout.package_folder(reference, package_id);
        if !folder.is_dir() {
            return Err(CacheError::Corrupt {
                path: folder.display().to_string(),
                reason: "package folder missing".to_owned(),
            });
        }
        Ok(Some(BinaryPackage { info, folder }))
    }

    fn install_binary(
        &self,
        mut info: BinaryInfo,
        staged: Option<&Path>,
    ) -> Result<BinaryPackage, CacheError> {
        let reference = info.reference.clone();
        let package_id = info.package_id.clone();
        let _lock = self.lock(&reference)?;

        if info.created_at.is_none() {
            info.created_at = Some(chrono::Utc::now().to_rfc3339());
        }

        let incoming = self.staging_dir()?;
        let incoming_folder = incoming.path().join("p");
        match staged {
            Some(path) => fs::rename(path, &incoming_folder)?,
            None => fs::create_dir_all(&incoming_folder)?,
        }
        write_atomic(
            &incoming.path().join("package.toml"),
            info.to_toml()?.as_bytes(),
        )?;

        let binary_dir = self.layout.binary_dir(&reference, &package_id);
        if binary_dir.exists() {
            warn!("replacing cached binary {reference} {}", package_id.short());
            fs::remove_dir_all(&binary_dir)?;
        }
        let packages_dir = self.layout.packages_dir(&reference);
        fs::create_dir_all(&packages_dir)?;
        // The staging directory guard is left to clean up a path that no longer exists.
        fs::rename(incoming.path(), &binary_dir)?;
        fsync_dir(&packages_dir)?;

        debug!("installed binary {reference} {}", package_id.short());
        Ok(BinaryPackage {
            folder: self.layout.package_folder(&reference, &package_id),
            info,
        })
    }

    fn staging_dir(&self) -> Result<tempfile::TempDir, CacheError> {
        let staging = self.layout.staging_dir();
        fs::create_dir_all(&staging)?;
        Ok(tempfile::Builder::new()
            .prefix("stage-")
            .tempdir_in(staging)?)
    }

    fn list(&self) -> Result<Vec<CachedRecipe>, CacheError> {
        let mut out = Vec::new();
        let recipes_dir = self.layout.recipes_dir();
        for name in sorted_subdirs(&recipes_dir)? {
            let Ok(pkg_name) = PackageName::parse(&name) else {
                warn!("ignoring unexpected cache directory: {name}");
                continue;
            };
            for version in sorted_subdirs(&recipes_dir.join(&name))? {
                let Ok(pkg_version) = Version::parse(&version) else {
                    warn!("ignoring unexpected cache directory: {name}/{version}");
                    continue;
                };
                let reference = PackageRef::new(pkg_name.clone(), pkg_version);
                let recipe = match self.recipe(&reference) {
                    Ok(Some(r)) => r,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("skipping unreadable recipe {reference}: {e}");
                        continue;
                    }
                };
                out.push(CachedRecipe {
                    binaries: self.binary_ids(&reference)?,
                    revision: recipe.revision(),
                    reference,
                });
            }
        }
        Ok(out)
    }

    fn remove(&self, reference: &PackageRef, binaries_only: bool) -> Result<usize, CacheError> {
        let _lock = self.lock(reference)?;
        let removed = self.binary_ids(reference)?.len();
        let packages_dir = self.layout.packages_dir(reference);
        let recipe_dir = self.layout.recipe_dir(reference);
        let had_recipe = recipe_dir.exists();

        if !packages_dir.exists() && (binaries_only || !had_recipe) {
            return Err(CacheError::NotFound(reference.to_string()));
        }

        if packages_dir.exists() {
            fs::remove_dir_all(&packages_dir)?;
        }
        if !binaries_only && had_recipe {
            fs::remove_dir_all(&recipe_dir)?;
        }
        debug!("removed {reference}: {removed} binaries, recipe removed: {}", !binaries_only && had_recipe);
        Ok(removed)
    }
}
