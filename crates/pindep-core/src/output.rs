use crate::generators::{RenderedFile, DESCRIPTOR_FILES};
use crate::CoreError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Write rendered descriptors into `dir` all-or-nothing.
///
/// Every file is first written and fsynced as a temp file in `dir`. The temp
/// files are then renamed over their final names, and descriptors left over
/// from generators not rendered in this pass are removed. If any step fails,
/// files changed earlier in this call are restored to their previous contents
/// (or removed when they did not exist before).
pub fn write_descriptors(dir: &Path, files: &[RenderedFile]) -> Result<Vec<PathBuf>, CoreError> {
    fs::create_dir_all(dir)?;

    let mut staged: Vec<(NamedTempFile, PathBuf)> = Vec::with_capacity(files.len());
    for file in files {
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(file.contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        staged.push((tmp, dir.join(file.file_name)));
    }

    let mut persisted: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(staged.len());
    for (tmp, dest) in staged {
        let previous = match fs::read(&dest) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                rollback(&persisted);
                return Err(e.into());
            }
        };
        if let Err(e) = tmp.persist(&dest) {
            rollback(&persisted);
            return Err(CoreError::Io(e.error));
        }
        debug!("wrote {}", dest.display());
        persisted.push((dest, previous));
    }
    let written = persisted.len();

    for name in DESCRIPTOR_FILES {
        if files.iter().any(|f| f.file_name == name) {
            continue;
        }
        let stale = dir.join(name);
        let previous = match fs::read(&stale) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                rollback(&persisted);
                return Err(e.into());
            }
        };
        if let Err(e) = fs::remove_file(&stale) {
            rollback(&persisted);
            return Err(e.into());
        }
        debug!("removed stale {}", stale.display());
        persisted.push((stale, Some(previous)));
    }

    if let Ok(f) = fs::File::open(dir) {
        let _ = f.sync_all();
    }
    Ok(persisted
        .into_iter()
        .take(written)
        .map(|(path, _)| path)
        .collect())
}

fn rollback(persisted: &[(PathBuf, Option<Vec<u8>>)]) {
    for (path, previous) in persisted.iter().rev() {
        let result = match previous {
            Some(bytes) => fs::write(path, bytes),
            None => fs::remove_file(path),
        };
        if let Err(e) = result {
            warn!("failed to roll back {}: {e}", path.display());
        }
    }
}
