use super::{json_pretty, maybe_spinner, spin_fail, spin_ok, CommandError, EXIT_SUCCESS};
use pindep_core::{Engine, ResolveRequest};
use std::path::Path;

pub fn run(
    engine: &Engine,
    manifest: &Path,
    request: &ResolveRequest,
    json: bool,
) -> Result<u8, CommandError> {
    let pb = maybe_spinner(json, "resolving dependencies...");
    let report = engine.lock(manifest, request).map_err(|e| {
        if let Some(ref pb) = pb {
            spin_fail(pb, "lock failed");
        }
        CommandError::from(e)
    })?;
    if let Some(ref pb) = pb {
        spin_ok(pb, "lock written");
    }

    if json {
        let payload = serde_json::json!({
            "path": report.path,
            "lock_id": report.lock.lock_id,
            "packages": report.lock.packages.len(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "wrote {} ({} packages)",
            report.path.display(),
            report.lock.packages.len()
        );
        println!("lock_id: {}", report.lock.lock_id);
    }
    Ok(EXIT_SUCCESS)
}
