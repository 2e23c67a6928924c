use crate::{RemoteError, RemoteSource};
use pindep_cache::{archive_digest, pack_package, unpack_package, BinaryPackage, PackageCache};
use pindep_schema::{PackageId, PackageRef};

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub reference: PackageRef,
    pub binaries_uploaded: usize,
}

/// Fetch a binary from `remote`, verify its archive digest, and install it
/// into `cache`. Returns `None` when the remote does not have it.
pub fn download_binary(
    remote: &dyn RemoteSource,
    cache: &dyn PackageCache,
    reference: &PackageRef,
    package_id: &PackageId,
) -> Result<Option<BinaryPackage>, RemoteError> {
    let Some(bin) = remote.fetch_binary(reference, package_id)? else {
        return Ok(None);
    };
    let key = format!("{reference}:{}", package_id.short());
    let actual = archive_digest(&bin.archive);
    match bin.info.archive_digest.as_deref() {
        Some(expected) if expected == actual => {}
        Some(expected) => {
            return Err(RemoteError::IntegrityFailure {
                key,
                expected: expected.to_owned(),
                actual,
            });
        }
        None => {
            return Err(RemoteError::InvalidResponse(format!(
                "{key}: package metadata from '{}' has no archive_digest",
                remote.name()
            )));
        }
    }

    let staging = cache.staging_dir()?;
    let folder = staging.path().join("pkg");
    unpack_package(&bin.archive, &folder)?;
    let pkg = cache.install_binary(bin.info, Some(&folder))?;
    tracing::debug!("downloaded {key} from '{}'", remote.name());
    Ok(Some(pkg))
}

/// Upload a cached recipe and every binary the cache holds for it.
pub fn upload_package(
    cache: &dyn PackageCache,
    remote: &dyn RemoteSource,
    reference: &PackageRef,
) -> Result<UploadResult, RemoteError> {
    let recipe = cache
        .recipe(reference)?
        .ok_or_else(|| RemoteError::NotFound(format!("{reference} is not in the local cache")))?;
    remote.upload_recipe(&recipe)?;

    let ids: Vec<PackageId> = cache
        .list()?
        .into_iter()
        .find(|r| r.reference == *reference)
        .map(|r| r.binaries)
        .unwrap_or_default();

    let mut binaries_uploaded = 0;
    for id in &ids {
        let Some(pkg) = cache.binary(reference, id)? else {
            continue;
        };
        let archive = pack_package(&pkg.folder)?;
        let mut info = pkg.info;
        info.archive_digest = Some(archive_digest(&archive));
        remote.upload_binary(&info, &archive)?;
        binaries_uploaded += 1;
    }

    tracing::info!(
        "uploaded {reference} with {binaries_uploaded} binaries to '{}'",
        remote.name()
    );
    Ok(UploadResult {
        reference: reference.clone(),
        binaries_uploaded,
    })
}
