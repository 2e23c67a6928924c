use super::{colorize_origin, json_pretty, maybe_spinner, spin_fail, spin_ok, CommandError, EXIT_SUCCESS};
use pindep_core::{Engine, InstallRequest};
use std::path::Path;

pub fn run(
    engine: &Engine,
    manifest: &Path,
    request: InstallRequest,
    json: bool,
) -> Result<u8, CommandError> {
    let pb = maybe_spinner(json, "resolving dependencies...");
    let report = match engine.install(manifest, &request) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "dependencies resolved");
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "install failed");
            }
            return Err(e.into());
        }
    };

    if json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    if !report.settings.is_empty() {
        println!("settings: {}", report.settings);
    }
    for pkg in &report.packages {
        println!(
            "  {:<28} {:<14} {}",
            pkg.reference.to_string(),
            pkg.package_id.short(),
            colorize_origin(&pkg.origin.to_string())
        );
    }
    for file in &report.files {
        println!("wrote {}", file.display());
    }
    if report.files.is_empty() {
        println!("no generators selected; nothing written");
    }
    Ok(EXIT_SUCCESS)
}
