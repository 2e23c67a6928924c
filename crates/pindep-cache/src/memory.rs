use crate::layout::CacheLayout;
use crate::{BinaryInfo, BinaryPackage, CacheError, CachedRecipe, PackageCache};
use pindep_schema::{PackageId, PackageRef, Recipe};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    recipes: BTreeMap<PackageRef, (Recipe, Option<PathBuf>)>,
    binaries: BTreeMap<(PackageRef, PackageId), BinaryInfo>,
}

/// In-process cache for tests. Binary folders are virtual paths under
/// `/pindep-memory`; staged contents are not kept.
pub struct MemoryCache {
    layout: CacheLayout,
    state: Mutex<State>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            layout: CacheLayout::new("/pindep-memory"),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, CacheError> {
        self.state
            .lock()
            .map_err(|_| CacheError::LockFailed("memory cache mutex poisoned".to_owned()))
    }

    fn package(&self, info: BinaryInfo) -> BinaryPackage {
        BinaryPackage {
            folder: self.layout.package_folder(&info.reference, &info.package_id),
            info,
        }
    }
}

impl PackageCache for MemoryCache {
    fn recipe(&self, reference: &PackageRef) -> Result<Option<Recipe>, CacheError> {
        Ok(self.state()?.recipes.get(reference).map(|(r, _)| r.clone()))
    }

    fn export_folder(&self, reference: &PackageRef) -> Option<PathBuf> {
        self.state()
            .ok()?
            .recipes
            .get(reference)
            .and_then(|(_, export)| export.clone())
    }

    fn put_recipe(&self, recipe: &Recipe, export_from: Option<&Path>) -> Result<(), CacheError> {
        self.state()?.recipes.insert(
            recipe.reference(),
            (recipe.clone(), export_from.map(Path::to_path_buf)),
        );
        Ok(())
    }

    fn binary(
        &self,
        reference: &PackageRef,
        package_id: &PackageId,
    ) -> Result<Option<BinaryPackage>, CacheError> {
        let info = self
            .state()?
            .binaries
            .get(&(reference.clone(), package_id.clone()))
            .cloned();
        Ok(info.map(|i| self.package(i)))
    }

    fn install_binary(
        &self,
        info: BinaryInfo,
        _staged: Option<&Path>,
    ) -> Result<BinaryPackage, CacheError> {
        let key = (info.reference.clone(), info.package_id.clone());
        self.state()?.binaries.insert(key, info.clone());
        Ok(self.package(info))
    }

    fn staging_dir(&self) -> Result<tempfile::TempDir, CacheError> {
        Ok(tempfile::tempdir()?)
    }

    fn list(&self) -> Result<Vec<CachedRecipe>, CacheError> {
        let state = self.state()?;
        Ok(state
            .recipes
            .iter()
            .map(|(reference, (recipe, _))| CachedRecipe {
                reference: reference.clone(),
                revision: recipe.revision(),
                binaries: state
                    .binaries
                    .keys()
                    .filter(|(r, _)| r == reference)
                    .map(|(_, id)| id.clone())
                    .collect(),
            })
            .collect())
    }

    fn remove(&self, reference: &PackageRef, binaries_only: bool) -> Result<usize, CacheError> {
        let mut state = self.state()?;
        let before = state.binaries.len();
        state.binaries.retain(|(r, _), _| r != reference);
        let removed = before - state.binaries.len();
        let recipe_removed = !binaries_only && state.recipes.remove(reference).is_some();
        if removed == 0 && !recipe_removed {
            return Err(CacheError::NotFound(reference.to_string()));
        }
        Ok(removed)
    }
}
