use crate::builder::{CommandBuilder, PackageBuilder};
use crate::config::{validate_profile_name, BuildPolicy, PindepConfig, PindepHome};
use crate::generators::render_all;
use crate::output::write_descriptors;
use crate::resolver::{PackageOrigin, Resolution, ResolveOptions, Resolver};
use crate::CoreError;
use pindep_cache::{DiskCache, PackageCache};
use pindep_remote::{upload_package, HttpRemote, RemoteSource, UploadResult};
use pindep_schema::{
    parse_manifest_file, parse_recipe_file, GeneratorKind, LockFile, NormalizedManifest,
    PackageId, PackageRef, Profile, ProfileError, Recipe, SettingName, Settings, DEFAULT_PROFILE,
    LOCK_FILE, MANIFEST_FILE, RECIPE_FILE,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Inputs shared by every operation that resolves a manifest.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    /// Profile name; falls back to the configured default, then `default`.
    pub profile: Option<String>,
    /// Command-line setting overrides, applied on top of the profile.
    pub settings: Vec<(SettingName, String)>,
    /// Overrides the configured build policy.
    pub build_policy: Option<BuildPolicy>,
    pub offline: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub resolve: ResolveRequest,
    /// Generators added to the manifest's own set.
    pub generators: Vec<GeneratorKind>,
    /// Defaults to `<manifest dir>/build/pindep`.
    pub output_folder: Option<PathBuf>,
    /// Require the resolution to match `pindep.lock`.
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageSummary {
    pub reference: PackageRef,
    pub package_id: PackageId,
    pub origin: PackageOrigin,
    pub folder: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub settings: Settings,
    pub packages: Vec<PackageSummary>,
    pub output_folder: PathBuf,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockReport {
    pub path: PathBuf,
    pub lock: LockFile,
}

/// Facade over configuration, profiles, cache, remotes, and resolution.
pub struct Engine {
    home: PindepHome,
    config: PindepConfig,
    cache: Box<dyn PackageCache>,
    remotes: Vec<Box<dyn RemoteSource>>,
    builder: Box<dyn PackageBuilder>,
}

impl Engine {
    /// Open the engine for a home directory: load `config.toml`, open the disk
    /// cache, and set up the configured HTTP remotes.
    pub fn open(home: PindepHome) -> Result<Self, CoreError> {
        let config = PindepConfig::load(&home.config_file())?;
        let cache = DiskCache::open(home.cache_dir())?;
        let remotes: Vec<Box<dyn RemoteSource>> = config
            .remotes
            .iter()
            .map(|r| Box::new(HttpRemote::new(r.clone())) as Box<dyn RemoteSource>)
            .collect();
        debug!(
            "opened pindep home {} ({} remotes)",
            home.root().display(),
            remotes.len()
        );
        Ok(Self::with_parts(
            home,
            config,
            Box::new(cache),
            remotes,
            Box::new(CommandBuilder::new()),
        ))
    }

    /// Assemble an engine from explicit parts.
    pub fn with_parts(
        home: PindepHome,
        config: PindepConfig,
        cache: Box<dyn PackageCache>,
        remotes: Vec<Box<dyn RemoteSource>>,
        builder: Box<dyn PackageBuilder>,
    ) -> Self {
        Self {
            home,
            config,
            cache,
            remotes,
            builder,
        }
    }

    pub fn home(&self) -> &PindepHome {
        &self.home
    }

    pub fn config(&self) -> &PindepConfig {
        &self.config
    }

    pub fn cache(&self) -> &dyn PackageCache {
        self.cache.as_ref()
    }

    /// Profile values overlaid with the request's overrides.
    ///
    /// A missing profile is an error only when it was named explicitly.
    pub fn effective_settings(&self, request: &ResolveRequest) -> Result<Settings, CoreError> {
        let explicit = request.profile.as_deref().or(self.config.default_profile.as_deref());
        let name = explicit.unwrap_or(DEFAULT_PROFILE);
        validate_profile_name(name)?;

        let mut settings = match Profile::load(self.home.profile_path(name)) {
            Ok(profile) => profile.settings,
            Err(ProfileError::NotFound(path)) if explicit.is_none() => {
                debug!("no default profile at {path}");
                Settings::new()
            }
            Err(e) => return Err(e.into()),
        };
        for (setting, value) in &request.settings {
            settings.set(*setting, value)?;
        }
        Ok(settings)
    }

    pub fn load_manifest(&self, manifest_path: &Path) -> Result<NormalizedManifest, CoreError> {
        let path = manifest_file(manifest_path);
        info!("reading manifest {}", path.display());
        Ok(parse_manifest_file(&path)?.normalize()?)
    }

    /// Resolve a manifest without writing descriptors.
    pub fn resolve(
        &self,
        manifest: &NormalizedManifest,
        request: &ResolveRequest,
    ) -> Result<Resolution, CoreError> {
        let settings = self.effective_settings(request)?;
        let options = ResolveOptions {
            build_policy: request.build_policy.unwrap_or(self.config.build),
            offline: request.offline,
        };
        debug!("resolving with [{settings}], build policy {}", options.build_policy);
        Resolver::new(self.cache.as_ref(), &self.remotes, self.builder.as_ref(), options)
            .resolve(manifest, &settings)
    }

    pub fn install(
        &self,
        manifest_path: &Path,
        request: &InstallRequest,
    ) -> Result<InstallReport, CoreError> {
        let manifest_path = manifest_file(manifest_path);
        let manifest = self
            .load_manifest(&manifest_path)?
            .with_extra_generators(&request.generators);
        if manifest.generators.is_empty() {
            warn!("no generators requested; nothing will be written");
        }

        let lock = if request.locked {
            let lock_path = manifest_dir(&manifest_path).join(LOCK_FILE);
            let lock = LockFile::read_from_file(&lock_path)?;
            lock.verify_integrity()?;
            lock.verify_manifest_intent(&manifest)?;
            Some(lock)
        } else {
            None
        };

        let resolution = self.resolve(&manifest, &request.resolve)?;
        if let Some(lock) = &lock {
            lock.verify_matches(&resolution.to_lock())?;
        }

        let files = render_all(&manifest.generators, &resolution)?;
        let output_folder = request
            .output_folder
            .clone()
            .unwrap_or_else(|| manifest_dir(&manifest_path).join("build").join("pindep"));
        let written = write_descriptors(&output_folder, &files)?;
        info!(
            "wrote {} descriptors to {}",
            written.len(),
            output_folder.display()
        );

        Ok(InstallReport {
            packages: summaries(&resolution),
            settings: resolution.settings,
            output_folder,
            files: written,
        })
    }

    /// Resolve and write `pindep.lock` next to the manifest.
    pub fn lock(
        &self,
        manifest_path: &Path,
        request: &ResolveRequest,
    ) -> Result<LockReport, CoreError> {
        let manifest_path = manifest_file(manifest_path);
        let manifest = self.load_manifest(&manifest_path)?;
        let resolution = self.resolve(&manifest, request)?;
        let lock = resolution.to_lock();
        let path = manifest_dir(&manifest_path).join(LOCK_FILE);
        lock.write_to_file(&path)?;
        info!("wrote {}", path.display());
        Ok(LockReport { path, lock })
    }

    /// Export a recipe directory (its `recipe.toml` plus every other file) into the cache.
    pub fn export_recipe(&self, recipe_dir: &Path) -> Result<Recipe, CoreError> {
        let recipe = parse_recipe_file(recipe_dir.join(RECIPE_FILE))?;
        self.cache.put_recipe(&recipe, Some(recipe_dir))?;
        info!(
            "exported {} ({})",
            recipe.reference(),
            recipe.revision().short()
        );
        Ok(recipe)
    }

    /// Upload a cached recipe and its binaries to a configured remote.
    pub fn upload(&self, reference: &PackageRef, remote_name: &str) -> Result<UploadResult, CoreError> {
        let remote = self
            .remotes
            .iter()
            .find(|r| r.name() == remote_name)
            .ok_or_else(|| CoreError::Config(format!("no remote named '{remote_name}'")))?;
        Ok(upload_package(self.cache.as_ref(), remote.as_ref(), reference)?)
    }
}

fn manifest_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(MANIFEST_FILE)
    } else {
        path.to_path_buf()
    }
}

fn manifest_dir(manifest_file: &Path) -> PathBuf {
    match manifest_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn summaries(resolution: &Resolution) -> Vec<PackageSummary> {
    resolution
        .packages
        .values()
        .map(|p| PackageSummary {
            reference: p.reference.clone(),
            package_id: p.package_id.clone(),
            origin: p.origin,
            folder: p.folder.clone(),
        })
        .collect()
}
