use crate::CacheError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Pack a package folder into a deterministic tar archive.
///
/// Entries are sorted by path; mtime, uid and gid are zeroed, so identical
/// folder contents produce byte-identical archives.
pub fn pack_package(source_dir: &Path) -> Result<Vec<u8>, CacheError> {
    let mut entries = collect_entries(source_dir, source_dir)?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut ar = tar::Builder::new(Vec::new());
    ar.follow_symlinks(false);

    for (rel_path, full_path) in &entries {
        let ft = match full_path.symlink_metadata() {
            Ok(m) => m.file_type(),
            Err(e) => {
                warn!("skipping {rel_path}: metadata error: {e}");
                continue;
            }
        };

        if ft.is_file() {
            append_file(&mut ar, rel_path, full_path)?;
        } else if ft.is_dir() {
            append_dir(&mut ar, rel_path, full_path)?;
        } else if ft.is_symlink() {
            append_symlink(&mut ar, rel_path, full_path)?;
        } else {
            warn!("skipping unsupported file type: {rel_path}");
        }
    }

    Ok(ar.into_inner()?)
}

/// Unpack an archive produced by [`pack_package`] into `target_dir`.
pub fn unpack_package(tar_data: &[u8], target_dir: &Path) -> Result<(), CacheError> {
    fs::create_dir_all(target_dir)?;
    let mut ar = tar::Archive::new(tar_data);
    ar.set_preserve_permissions(true);
    ar.set_preserve_mtime(false);
    ar.set_unpack_xattrs(false);
    ar.unpack(target_dir)?;
    Ok(())
}

pub fn archive_digest(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

fn collect_entries(root: &Path, current: &Path) -> Result<Vec<(String, PathBuf)>, CacheError> {
    let mut result = Vec::new();
    if !current.exists() {
        return Ok(result);
    }
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        let full = entry.path();
        let rel = full
            .strip_prefix(root)
            .map_err(|e| CacheError::Io(std::io::Error::other(format!("path strip: {e}"))))?
            .to_string_lossy()
            .replace('\\', "/");

        let meta = full.symlink_metadata()?;
        if meta.is_dir() {
            result.push((rel.clone(), full.clone()));
            result.extend(collect_entries(root, &full)?);
        } else {
            result.push((rel, full));
        }
    }
    Ok(result)
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() {
        0o755
    } else {
        0o644
    }
}

fn make_header(full_path: &Path, entry_type: tar::EntryType) -> Result<tar::Header, CacheError> {
    let meta = full_path.symlink_metadata()?;
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(file_mode(&meta));
    Ok(header)
}

fn append_file(
    ar: &mut tar::Builder<Vec<u8>>,
    rel_path: &str,
    full_path: &Path,
) -> Result<(), CacheError> {
    let data = fs::read(full_path)?;
    let mut header = make_header(full_path, tar::EntryType::Regular)?;
    header.set_size(data.len() as u64);
    header.set_cksum();
    ar.append_data(&mut header, rel_path, data.as_slice())?;
    Ok(())
}

fn append_dir(
    ar: &mut tar::Builder<Vec<u8>>,
    rel_path: &str,
    full_path: &Path,
) -> Result<(), CacheError> {
    let mut header = make_header(full_path, tar::EntryType::Directory)?;
    header.set_size(0);
    header.set_cksum();
    let path = if rel_path.ends_with('/') {
        rel_path.to_owned()
    } else {
        format!("{rel_path}/")
    };
    ar.append_data(&mut header, &path, &[] as &[u8])?;
    Ok(())
}

fn append_symlink(
    ar: &mut tar::Builder<Vec<u8>>,
    rel_path: &str,
    full_path: &Path,
) -> Result<(), CacheError> {
    let target = fs::read_link(full_path)?;
    let mut header = make_header(full_path, tar::EntryType::Symlink)?;
    header.set_size(0);
    header.set_cksum();
    ar.append_link(&mut header, rel_path, &target)?;
    Ok(())
}
