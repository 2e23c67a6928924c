use crate::builder::{BuildContext, PackageBuilder};
use crate::concurrency::shutdown_requested;
use crate::config::BuildPolicy;
use crate::CoreError;
use pindep_cache::{BinaryInfo, BinaryPackage, PackageCache};
use pindep_remote::{download_binary, RemoteSource};
use pindep_schema::{
    compute_package_id, CppInfo, LockFile, LockedPackage, NormalizedManifest, PackageId,
    PackageName, PackageRef, Recipe, RecipeRevision, Settings,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub build_policy: BuildPolicy,
    /// Never contact remotes.
    pub offline: bool,
}

/// Where a resolved binary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageOrigin {
    Cache,
    Remote,
    Build,
}

impl fmt::Display for PackageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageOrigin::Cache => f.write_str("cache"),
            PackageOrigin::Remote => f.write_str("remote"),
            PackageOrigin::Build => f.write_str("build"),
        }
    }
}

/// One node of the resolved graph with the binary selected for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub reference: PackageRef,
    pub recipe_revision: RecipeRevision,
    pub package_id: PackageId,
    pub settings_key: Settings,
    /// Resolved requirements, after direct pins are applied.
    pub requires: Vec<PackageRef>,
    pub cpp_info: CppInfo,
    pub target_name: String,
    pub folder: PathBuf,
    pub origin: PackageOrigin,
}

/// The outcome of one resolution pass.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub settings: Settings,
    /// Every package of the graph, keyed and therefore iterated by name.
    pub packages: BTreeMap<PackageName, ResolvedPackage>,
    /// Dependencies-first order; ties broken by name.
    pub order: Vec<PackageName>,
}

impl Resolution {
    pub fn get(&self, name: &PackageName) -> Option<&ResolvedPackage> {
        self.packages.get(name)
    }

    pub fn to_lock(&self) -> LockFile {
        let packages = self
            .packages
            .values()
            .map(|p| LockedPackage {
                name: p.reference.name.clone(),
                version: p.reference.version.clone(),
                recipe_revision: p.recipe_revision.clone(),
                package_id: p.package_id.clone(),
            })
            .collect();
        LockFile::new(self.settings.clone(), packages)
    }
}

struct Node {
    recipe: Recipe,
    requested_by: String,
    requires: Vec<PackageRef>,
}

/// Resolves a manifest against an injected cache, optional remotes, and a
/// builder for missing binaries.
pub struct Resolver<'a> {
    cache: &'a dyn PackageCache,
    remotes: &'a [Box<dyn RemoteSource>],
    builder: &'a dyn PackageBuilder,
    options: ResolveOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(
        cache: &'a dyn PackageCache,
        remotes: &'a [Box<dyn RemoteSource>],
        builder: &'a dyn PackageBuilder,
        options: ResolveOptions,
    ) -> Self {
        Self {
            cache,
            remotes,
            builder,
            options,
        }
    }

    pub fn resolve(
        &self,
        manifest: &NormalizedManifest,
        settings: &Settings,
    ) -> Result<Resolution, CoreError> {
        if let Some(setting) = settings.missing(&manifest.settings).into_iter().next() {
            return Err(CoreError::MissingSetting {
                setting,
                required_by: None,
            });
        }

        let nodes = self.expand(manifest)?;
        let order = topological_order(&nodes)?;
        info!("resolved graph of {} packages", order.len());

        let mut packages: BTreeMap<PackageName, ResolvedPackage> = BTreeMap::new();
        for name in &order {
            if shutdown_requested() {
                return Err(CoreError::Interrupted);
            }
            let Some(node) = nodes.get(name) else {
                continue;
            };
            let resolved = self.select_binary(node, settings, &packages)?;
            info!(
                "{} {} ({})",
                resolved.reference,
                resolved.package_id.short(),
                resolved.origin
            );
            packages.insert(name.clone(), resolved);
        }

        Ok(Resolution {
            settings: settings.clone(),
            packages,
            order,
        })
    }

    /// Breadth-first expansion from the direct requirements.
    fn expand(&self, manifest: &NormalizedManifest) -> Result<BTreeMap<PackageName, Node>, CoreError> {
        let direct: BTreeMap<&PackageName, &PackageRef> =
            manifest.requires.iter().map(|r| (&r.name, r)).collect();

        let mut nodes: BTreeMap<PackageName, Node> = BTreeMap::new();
        let mut queue: VecDeque<(PackageRef, Option<PackageRef>)> =
            manifest.requires.iter().map(|r| (r.clone(), None)).collect();

        while let Some((reference, parent)) = queue.pop_front() {
            if shutdown_requested() {
                return Err(CoreError::Interrupted);
            }
            let requested_by = parent
                .as_ref()
                .map_or_else(|| "the manifest".to_owned(), ToString::to_string);

            if let Some(existing) = nodes.get(&reference.name) {
                let existing_version = &existing.recipe.version;
                if *existing_version != reference.version {
                    return Err(CoreError::VersionConflict {
                        name: reference.name.clone(),
                        first_version: existing_version.clone(),
                        first_by: existing.requested_by.clone(),
                        second_version: reference.version.clone(),
                        second_by: requested_by,
                    });
                }
                continue;
            }

            let recipe = self.find_recipe(&reference, parent.as_ref())?;
            let mut requires = Vec::with_capacity(recipe.requires.len());
            for req in &recipe.requires {
                let effective = match direct.get(&req.name) {
                    Some(pinned) if pinned.version != req.version => {
                        debug!(
                            "{reference} requires {req}; using {pinned} pinned by the manifest"
                        );
                        (*pinned).clone()
                    }
                    _ => req.clone(),
                };
                queue.push_back((effective.clone(), Some(reference.clone())));
                requires.push(effective);
            }

            nodes.insert(
                reference.name.clone(),
                Node {
                    recipe,
                    requested_by,
                    requires,
                },
            );
        }
        Ok(nodes)
    }

    fn find_recipe(
        &self,
        reference: &PackageRef,
        parent: Option<&PackageRef>,
    ) -> Result<Recipe, CoreError> {
        if let Some(recipe) = self.cache.recipe(reference)? {
            debug!("recipe {reference}: cache hit");
            return Ok(recipe);
        }
        debug!("recipe {reference}: not in cache");

        if !self.options.offline {
            for remote in self.remotes {
                if let Some(recipe) = remote.fetch_recipe(reference)? {
                    info!("fetched recipe {reference} from '{}'", remote.name());
                    self.cache.put_recipe(&recipe, None)?;
                    return Ok(recipe);
                }
            }
        }

        Err(CoreError::UnresolvedDependency {
            reference: reference.clone(),
            required_by: parent.cloned(),
        })
    }

    fn select_binary(
        &self,
        node: &Node,
        settings: &Settings,
        resolved: &BTreeMap<PackageName, ResolvedPackage>,
    ) -> Result<ResolvedPackage, CoreError> {
        let recipe = &node.recipe;
        let reference = recipe.reference();
        let settings_key =
            settings
                .subset(&recipe.settings)
                .map_err(|setting| CoreError::MissingSetting {
                    setting,
                    required_by: Some(reference.clone()),
                })?;
        let revision = recipe.revision();
        let package_id = compute_package_id(&reference, &revision, &settings_key, &node.requires);

        let (package, origin) = if let Some(pkg) = self.cache.binary(&reference, &package_id)? {
            (pkg, PackageOrigin::Cache)
        } else if let Some(pkg) = self.download(&reference, &package_id)? {
            (pkg, PackageOrigin::Remote)
        } else if self.options.build_policy == BuildPolicy::Missing && recipe.is_buildable() {
            let info = BinaryInfo {
                reference: reference.clone(),
                package_id: package_id.clone(),
                recipe_revision: revision.clone(),
                requires: node.requires.clone(),
                archive_digest: None,
                created_at: None,
                settings: settings_key.clone(),
                cpp_info: recipe.cpp_info.clone(),
            };
            (self.build(recipe, settings, info, &node.requires, resolved)?, PackageOrigin::Build)
        } else {
            if recipe.is_buildable() {
                debug!("{reference}: binary missing and build policy is never");
            }
            return Err(CoreError::IncompatibleSettings {
                reference,
                package_id,
                settings: settings_key,
            });
        };

        if package.info.recipe_revision != revision {
            warn!(
                "{reference}: binary {} records recipe revision {}, expected {}",
                package_id.short(),
                package.info.recipe_revision.short(),
                revision.short()
            );
        }

        Ok(ResolvedPackage {
            target_name: recipe.target_name(),
            reference,
            recipe_revision: revision,
            package_id,
            settings_key,
            requires: node.requires.clone(),
            cpp_info: recipe.cpp_info.clone(),
            folder: package.folder,
            origin,
        })
    }

    fn download(
        &self,
        reference: &PackageRef,
        package_id: &PackageId,
    ) -> Result<Option<BinaryPackage>, CoreError> {
        if self.options.offline {
            return Ok(None);
        }
        for remote in self.remotes {
            if let Some(pkg) = download_binary(remote.as_ref(), self.cache, reference, package_id)? {
                info!(
                    "downloaded {reference} {} from '{}'",
                    package_id.short(),
                    remote.name()
                );
                return Ok(Some(pkg));
            }
        }
        Ok(None)
    }

    fn build(
        &self,
        recipe: &Recipe,
        settings: &Settings,
        info: BinaryInfo,
        requires: &[PackageRef],
        resolved: &BTreeMap<PackageName, ResolvedPackage>,
    ) -> Result<BinaryPackage, CoreError> {
        let reference = recipe.reference();
        info!("building {reference} from source");

        let staging = self.cache.staging_dir()?;
        let build_folder = staging.path().join("build");
        let package_folder = staging.path().join("package");
        let export_folder = self.cache.export_folder(&reference);
        let dependency_folders = requires
            .iter()
            .filter_map(|r| resolved.get(&r.name).map(|p| p.folder.clone()))
            .collect();

        let ctx = BuildContext {
            recipe,
            settings,
            export_folder: export_folder.as_deref(),
            dependency_folders,
            build_folder: &build_folder,
            package_folder: &package_folder,
        };
        self.builder.build(&ctx)?;
        Ok(self.cache.install_binary(info, Some(&package_folder))?)
    }
}

/// Kahn's algorithm over name-keyed nodes; the ready set is ordered by name.
fn topological_order(nodes: &BTreeMap<PackageName, Node>) -> Result<Vec<PackageName>, CoreError> {
    let mut pending: BTreeMap<&PackageName, BTreeSet<&PackageName>> = nodes
        .iter()
        .map(|(name, node)| (name, node.requires.iter().map(|r| &r.name).collect()))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    loop {
        let ready: Vec<&PackageName> = pending
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(name, _)| *name)
            .collect();
        let Some(next) = ready.first().copied() else {
            break;
        };
        pending.remove(next);
        for deps in pending.values_mut() {
            deps.remove(next);
        }
        order.push(next.clone());
    }

    if pending.is_empty() {
        return Ok(order);
    }
    Err(CoreError::DependencyCycle(find_cycle(&pending)))
}

/// Every remaining node has a remaining dependency, so walking from the
/// smallest one must revisit a node.
fn find_cycle(pending: &BTreeMap<&PackageName, BTreeSet<&PackageName>>) -> Vec<PackageName> {
    let mut path: Vec<&PackageName> = Vec::new();
    let mut current = pending.keys().next().copied();
    while let Some(name) = current {
        if let Some(pos) = path.iter().position(|n| *n == name) {
            return path[pos..].iter().map(|n| (*n).clone()).collect();
        }
        path.push(name);
        current = pending
            .get(name)
            .and_then(|deps| deps.iter().next().copied());
    }
    path.into_iter().cloned().collect()
}
