use pindep_cache::{
    archive_digest, pack_package, unpack_package, BinaryInfo, DiskCache, PackageCache,
};
use pindep_schema::{PackageId, PackageRef, Recipe, SettingName, Settings};
use std::fs;
use std::sync::Arc;

fn info(reference: &PackageRef, id: &str) -> BinaryInfo {
    let recipe = Recipe::new(reference);
    BinaryInfo {
        reference: reference.clone(),
        package_id: PackageId::new(id),
        recipe_revision: recipe.revision(),
        requires: Vec::new(),
        archive_digest: None,
        created_at: None,
        settings: Settings::new().with(SettingName::Arch, "x86_64").unwrap(),
        cpp_info: recipe.cpp_info,
    }
}

#[test]
fn concurrent_installs_of_same_binary_leave_one_consistent_entry() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(DiskCache::open(dir.path()).unwrap());
    let reference: PackageRef = "protobuf/3.21.12".parse().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let reference = reference.clone();
            std::thread::spawn(move || {
                let stage = cache.staging_dir().unwrap();
                let staged = stage.path().join("pkg");
                fs::create_dir_all(staged.join("lib")).unwrap();
                fs::write(staged.join("lib/libprotobuf.a"), format!("build {i}")).unwrap();
                cache
                    .install_binary(info(&reference, "shared"), Some(&staged))
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let pkg = cache
        .binary(&reference, &PackageId::new("shared"))
        .unwrap()
        .unwrap();
    let content = fs::read_to_string(pkg.folder.join("lib/libprotobuf.a")).unwrap();
    assert!(content.starts_with("build "));
    assert_eq!(cache.list().unwrap().len(), 0, "no recipe was stored");
}

#[test]
fn packed_binary_reinstalls_identically_in_another_cache() {
    let reference: PackageRef = "zlib/1.3.1".parse().unwrap();

    let src_dir = tempfile::tempdir().unwrap();
    let src = DiskCache::open(src_dir.path()).unwrap();
    let stage = src.staging_dir().unwrap();
    let staged = stage.path().join("pkg");
    fs::create_dir_all(staged.join("include")).unwrap();
    fs::write(staged.join("include/zlib.h"), b"#define ZLIB_VERSION \"1.3.1\"\n").unwrap();
    let pkg = src.install_binary(info(&reference, "z1"), Some(&staged)).unwrap();

    let archive = pack_package(&pkg.folder).unwrap();
    let digest = archive_digest(&archive);

    let dst_dir = tempfile::tempdir().unwrap();
    let dst = DiskCache::open(dst_dir.path()).unwrap();
    let incoming = dst.staging_dir().unwrap();
    let unpacked = incoming.path().join("pkg");
    unpack_package(&archive, &unpacked).unwrap();
    let mut meta = pkg.info.clone();
    meta.archive_digest = Some(digest.clone());
    let copy = dst.install_binary(meta, Some(&unpacked)).unwrap();

    assert_eq!(archive_digest(&pack_package(&copy.folder).unwrap()), digest);
    assert_eq!(copy.info.archive_digest.as_deref(), Some(digest.as_str()));
}
