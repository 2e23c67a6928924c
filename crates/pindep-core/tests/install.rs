use pindep_cache::{archive_digest, pack_package, BinaryInfo, DiskCache, PackageCache};
use pindep_core::{
    BuildContext, BuildPolicy, CoreError, Engine, InstallRequest, PackageBuilder, PackageOrigin,
    PindepConfig, PindepHome, ResolveRequest,
};
use pindep_remote::{RemoteBinary, RemoteError, RemoteSource};
use pindep_schema::{
    compute_package_id, BuildSection, CppInfo, PackageId, PackageRef, Profile, Recipe,
    SettingName, Settings,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn settings() -> Settings {
    Settings::new()
        .with(SettingName::Os, "Linux")
        .unwrap()
        .with(SettingName::Compiler, "gcc")
        .unwrap()
        .with(SettingName::BuildType, "Release")
        .unwrap()
        .with(SettingName::Arch, "x86_64")
        .unwrap()
}

fn recipe(reference: &str, requires: &[&str]) -> Recipe {
    let mut r = Recipe::new(&reference.parse().unwrap());
    r.requires = requires.iter().map(|s| s.parse().unwrap()).collect();
    r
}

fn info_for(recipe: &Recipe, settings: &Settings) -> BinaryInfo {
    let key = settings.subset(&recipe.settings).unwrap();
    BinaryInfo {
        reference: recipe.reference(),
        package_id: compute_package_id(&recipe.reference(), &recipe.revision(), &key, &recipe.requires),
        recipe_revision: recipe.revision(),
        requires: recipe.requires.clone(),
        archive_digest: None,
        created_at: None,
        settings: key,
        cpp_info: recipe.cpp_info.clone(),
    }
}

fn seed(cache: &dyn PackageCache, recipe: &Recipe) {
    cache.put_recipe(recipe, None).unwrap();
    cache.install_binary(info_for(recipe, &settings()), None).unwrap();
}

fn seed_grpc_graph(cache: &dyn PackageCache) {
    seed(cache, &recipe("protobuf/3.21.12", &[]));
    seed(cache, &recipe("grpc/1.54.3", &["protobuf/3.21.12"]));
    seed(cache, &recipe("sfml/2.6.1", &[]));
}

fn write_manifest(dir: &Path, requires: &[&str], generators: &[&str]) -> PathBuf {
    let quoted = |items: &[&str]| {
        items
            .iter()
            .map(|s| format!("\"{s}\""))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let path = dir.join("pindep.toml");
    fs::write(
        &path,
        format!(
            r#"
manifest_version = 1
settings = ["os", "compiler", "build_type", "arch"]
generators = [{}]
requires = [{}]
"#,
            quoted(generators),
            quoted(requires)
        ),
    )
    .unwrap();
    path
}

/// Writes one header into the package folder and counts invocations.
struct CountingBuilder {
    builds: Arc<AtomicUsize>,
}

impl PackageBuilder for CountingBuilder {
    fn build(&self, ctx: &BuildContext<'_>) -> Result<(), CoreError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let include = ctx.package_folder.join("include");
        fs::create_dir_all(&include)?;
        fs::write(include.join(format!("{}.h", ctx.recipe.name)), "#pragma once\n")?;
        Ok(())
    }
}

struct Fixture {
    home_dir: tempfile::TempDir,
    project: tempfile::TempDir,
    builds: Arc<AtomicUsize>,
}

impl Fixture {
    fn new() -> Self {
        let home_dir = tempfile::tempdir().unwrap();
        let home = PindepHome::new(home_dir.path());
        Profile { settings: settings() }
            .save(home.profile_path("default"))
            .unwrap();
        Self {
            home_dir,
            project: tempfile::tempdir().unwrap(),
            builds: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn home(&self) -> PindepHome {
        PindepHome::new(self.home_dir.path())
    }

    fn engine_with(&self, remotes: Vec<Box<dyn RemoteSource>>) -> Engine {
        let home = self.home();
        let cache = DiskCache::open(home.cache_dir()).unwrap();
        Engine::with_parts(
            home,
            PindepConfig::default(),
            Box::new(cache),
            remotes,
            Box::new(CountingBuilder {
                builds: Arc::clone(&self.builds),
            }),
        )
    }

    fn engine(&self) -> Engine {
        self.engine_with(Vec::new())
    }

    fn output(&self) -> PathBuf {
        self.project.path().join("build").join("pindep")
    }
}

#[test]
fn three_packages_produce_one_deps_file() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_grpc_graph(engine.cache());
    let manifest = write_manifest(
        fx.project.path(),
        &["sfml/2.6.1", "protobuf/3.21.12", "grpc/1.54.3"],
        &["CMakeDeps"],
    );

    let report = engine.install(&manifest, &InstallRequest::default()).unwrap();
    assert_eq!(report.output_folder, fx.output());
    assert_eq!(report.files, vec![fx.output().join("pindep-deps.cmake")]);
    assert_eq!(fs::read_dir(fx.output()).unwrap().count(), 1);

    let names: Vec<String> = report.packages.iter().map(|p| p.reference.to_string()).collect();
    assert_eq!(names, vec!["grpc/1.54.3", "protobuf/3.21.12", "sfml/2.6.1"]);
    assert!(report.packages.iter().all(|p| p.origin == PackageOrigin::Cache));

    let text = fs::read_to_string(&report.files[0]).unwrap();
    assert!(text.contains("set(PINDEP_PACKAGES \"grpc;protobuf;sfml\")"));
}

#[test]
fn both_generators_write_two_files() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_grpc_graph(engine.cache());
    let manifest = write_manifest(fx.project.path(), &["grpc/1.54.3"], &["CMakeDeps"]);

    let request = InstallRequest {
        generators: vec![pindep_schema::GeneratorKind::CMakeToolchain],
        ..InstallRequest::default()
    };
    let report = engine.install(&manifest, &request).unwrap();
    assert_eq!(report.files.len(), 2);
    assert!(fx.output().join("pindep-deps.cmake").is_file());
    let toolchain = fs::read_to_string(fx.output().join("pindep-toolchain.cmake")).unwrap();
    assert!(toolchain.contains("set(CMAKE_BUILD_TYPE \"Release\")"));
}

#[test]
fn dropping_a_generator_removes_its_descriptor() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_grpc_graph(engine.cache());
    let manifest = write_manifest(
        fx.project.path(),
        &["grpc/1.54.3"],
        &["CMakeDeps", "CMakeToolchain"],
    );
    let first = engine.install(&manifest, &InstallRequest::default()).unwrap();
    assert_eq!(first.files.len(), 2);

    let manifest = write_manifest(fx.project.path(), &["grpc/1.54.3"], &["CMakeDeps"]);
    let second = engine.install(&manifest, &InstallRequest::default()).unwrap();
    assert_eq!(second.files, vec![fx.output().join("pindep-deps.cmake")]);
    let on_disk: Vec<String> = fs::read_dir(fx.output())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(on_disk, vec!["pindep-deps.cmake"]);
}

#[test]
fn unknown_package_writes_nothing() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_grpc_graph(engine.cache());
    let manifest = write_manifest(
        fx.project.path(),
        &["grpc/1.54.3", "sfml/99.0.0"],
        &["CMakeDeps", "CMakeToolchain"],
    );

    let err = engine.install(&manifest, &InstallRequest::default()).unwrap_err();
    assert!(matches!(err, CoreError::UnresolvedDependency { .. }), "{err}");
    assert!(!fx.output().exists());
}

#[test]
fn repeated_install_is_byte_identical() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_grpc_graph(engine.cache());
    let manifest = write_manifest(
        fx.project.path(),
        &["grpc/1.54.3"],
        &["CMakeDeps", "CMakeToolchain"],
    );

    let first = engine.install(&manifest, &InstallRequest::default()).unwrap();
    let before: BTreeMap<PathBuf, Vec<u8>> = first
        .files
        .iter()
        .map(|p| (p.clone(), fs::read(p).unwrap()))
        .collect();
    let second = engine.install(&manifest, &InstallRequest::default()).unwrap();
    for path in &second.files {
        assert_eq!(&fs::read(path).unwrap(), &before[path], "{}", path.display());
    }
}

#[test]
fn requirement_order_does_not_change_output() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed_grpc_graph(engine.cache());

    let a = write_manifest(fx.project.path(), &["sfml/2.6.1", "grpc/1.54.3"], &["CMakeDeps"]);
    engine.install(&a, &InstallRequest::default()).unwrap();
    let first = fs::read(fx.output().join("pindep-deps.cmake")).unwrap();

    let b = write_manifest(fx.project.path(), &["grpc/1.54.3", "sfml/2.6.1"], &["CMakeDeps"]);
    engine.install(&b, &InstallRequest::default()).unwrap();
    let second = fs::read(fx.output().join("pindep-deps.cmake")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn missing_binary_is_built_once_then_cached() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let mut fmt = recipe("fmt/10.2.1", &[]);
    fmt.build = Some(BuildSection {
        command: vec!["true".to_owned()],
    });
    engine.cache().put_recipe(&fmt, None).unwrap();
    let manifest = write_manifest(fx.project.path(), &["fmt/10.2.1"], &["CMakeDeps"]);

    let request = InstallRequest {
        resolve: ResolveRequest {
            build_policy: Some(BuildPolicy::Missing),
            ..ResolveRequest::default()
        },
        ..InstallRequest::default()
    };
    let report = engine.install(&manifest, &request).unwrap();
    assert_eq!(report.packages[0].origin, PackageOrigin::Build);
    assert!(report.packages[0].folder.join("include/fmt.h").is_file());
    assert_eq!(fx.builds.load(Ordering::SeqCst), 1);

    let report = engine.install(&manifest, &request).unwrap();
    assert_eq!(report.packages[0].origin, PackageOrigin::Cache);
    assert_eq!(fx.builds.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_binary_without_build_is_incompatible() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let mut fmt = recipe("fmt/10.2.1", &[]);
    fmt.build = Some(BuildSection {
        command: vec!["true".to_owned()],
    });
    engine.cache().put_recipe(&fmt, None).unwrap();
    let manifest = write_manifest(fx.project.path(), &["fmt/10.2.1"], &["CMakeDeps"]);

    let err = engine.install(&manifest, &InstallRequest::default()).unwrap_err();
    assert!(matches!(err, CoreError::IncompatibleSettings { .. }), "{err}");
    assert_eq!(fx.builds.load(Ordering::SeqCst), 0);
    assert!(!fx.output().exists());
}

#[test]
fn setting_override_selects_other_binary() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed(engine.cache(), &recipe("zlib/1.3.1", &[]));
    let manifest = write_manifest(fx.project.path(), &["zlib/1.3.1"], &["CMakeDeps"]);

    let request = InstallRequest {
        resolve: ResolveRequest {
            settings: vec![(SettingName::BuildType, "Debug".to_owned())],
            ..ResolveRequest::default()
        },
        ..InstallRequest::default()
    };
    let err = engine.install(&manifest, &request).unwrap_err();
    match err {
        CoreError::IncompatibleSettings { settings, .. } => {
            assert_eq!(settings.get(SettingName::BuildType), Some("Debug"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn conflicting_transitive_versions_fail() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed(engine.cache(), &recipe("zlib/1.3.1", &[]));
    seed(engine.cache(), &recipe("zlib/1.2.13", &[]));
    seed(engine.cache(), &recipe("libpng/1.6.40", &["zlib/1.2.13"]));
    seed(engine.cache(), &recipe("openssl/3.2.1", &["zlib/1.3.1"]));
    let manifest = write_manifest(
        fx.project.path(),
        &["libpng/1.6.40", "openssl/3.2.1"],
        &["CMakeDeps"],
    );

    let err = engine.install(&manifest, &InstallRequest::default()).unwrap_err();
    assert!(matches!(err, CoreError::VersionConflict { .. }), "{err}");
}

#[test]
fn dependency_cycle_is_reported() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed(engine.cache(), &recipe("a/1.0", &["b/1.0"]));
    seed(engine.cache(), &recipe("b/1.0", &["a/1.0"]));
    let manifest = write_manifest(fx.project.path(), &["a/1.0"], &["CMakeDeps"]);

    let err = engine.install(&manifest, &InstallRequest::default()).unwrap_err();
    assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
}

#[test]
fn locked_install_rejects_drift() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed(engine.cache(), &recipe("zlib/1.3.1", &[]));
    seed(engine.cache(), &recipe("zlib/1.2.13", &[]));
    let manifest = write_manifest(fx.project.path(), &["zlib/1.3.1"], &["CMakeDeps"]);

    let report = engine.lock(&manifest, &ResolveRequest::default()).unwrap();
    assert_eq!(report.path, fx.project.path().join("pindep.lock"));

    let locked = InstallRequest {
        locked: true,
        ..InstallRequest::default()
    };
    engine.install(&manifest, &locked).unwrap();

    write_manifest(fx.project.path(), &["zlib/1.2.13"], &["CMakeDeps"]);
    let err = engine.install(&manifest, &locked).unwrap_err();
    assert!(matches!(err, CoreError::LockMismatch(_)), "{err}");
}

#[test]
fn locked_install_without_lock_file_fails() {
    let fx = Fixture::new();
    let engine = fx.engine();
    seed(engine.cache(), &recipe("zlib/1.3.1", &[]));
    let manifest = write_manifest(fx.project.path(), &["zlib/1.3.1"], &["CMakeDeps"]);
    let locked = InstallRequest {
        locked: true,
        ..InstallRequest::default()
    };
    assert!(matches!(
        engine.install(&manifest, &locked),
        Err(CoreError::LockMismatch(_))
    ));
}

/// Serves recipes and packed binaries from memory.
struct StaticRemote {
    recipes: Vec<Recipe>,
    binaries: Vec<RemoteBinary>,
}

impl RemoteSource for StaticRemote {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_recipe(&self, reference: &PackageRef) -> Result<Option<Recipe>, RemoteError> {
        Ok(self
            .recipes
            .iter()
            .find(|r| r.reference() == *reference)
            .cloned())
    }

    fn fetch_binary(
        &self,
        reference: &PackageRef,
        package_id: &PackageId,
    ) -> Result<Option<RemoteBinary>, RemoteError> {
        Ok(self
            .binaries
            .iter()
            .find(|b| b.info.reference == *reference && b.info.package_id == *package_id)
            .cloned())
    }

    fn upload_recipe(&self, _recipe: &Recipe) -> Result<(), RemoteError> {
        Ok(())
    }

    fn upload_binary(&self, _info: &BinaryInfo, _archive: &[u8]) -> Result<(), RemoteError> {
        Ok(())
    }
}

fn remote_with_zlib() -> StaticRemote {
    let mut zlib = recipe("zlib/1.3.1", &[]);
    zlib.cpp_info = CppInfo {
        libs: vec!["z".to_owned()],
        ..CppInfo::default()
    };
    let src = tempfile::tempdir().unwrap();
    fs::create_dir_all(src.path().join("include")).unwrap();
    fs::write(src.path().join("include/zlib.h"), "/* zlib */\n").unwrap();
    let archive = pack_package(src.path()).unwrap();
    let mut info = info_for(&zlib, &settings());
    info.archive_digest = Some(archive_digest(&archive));
    StaticRemote {
        recipes: vec![zlib],
        binaries: vec![RemoteBinary { info, archive }],
    }
}

#[test]
fn remote_recipe_and_binary_are_fetched_into_cache() {
    let fx = Fixture::new();
    let engine = fx.engine_with(vec![Box::new(remote_with_zlib())]);
    let manifest = write_manifest(fx.project.path(), &["zlib/1.3.1"], &["CMakeDeps"]);

    let report = engine.install(&manifest, &InstallRequest::default()).unwrap();
    assert_eq!(report.packages[0].origin, PackageOrigin::Remote);
    assert!(report.packages[0].folder.join("include/zlib.h").is_file());
    let text = fs::read_to_string(fx.output().join("pindep-deps.cmake")).unwrap();
    assert!(text.contains("set(zlib_LIBS \"z\")"));

    let offline = InstallRequest {
        resolve: ResolveRequest {
            offline: true,
            ..ResolveRequest::default()
        },
        ..InstallRequest::default()
    };
    let report = engine.install(&manifest, &offline).unwrap();
    assert_eq!(report.packages[0].origin, PackageOrigin::Cache);
}

#[test]
fn offline_install_does_not_consult_remotes() {
    let fx = Fixture::new();
    let engine = fx.engine_with(vec![Box::new(remote_with_zlib())]);
    let manifest = write_manifest(fx.project.path(), &["zlib/1.3.1"], &["CMakeDeps"]);
    let offline = InstallRequest {
        resolve: ResolveRequest {
            offline: true,
            ..ResolveRequest::default()
        },
        ..InstallRequest::default()
    };
    let err = engine.install(&manifest, &offline).unwrap_err();
    assert!(matches!(err, CoreError::UnresolvedDependency { .. }), "{err}");
}
