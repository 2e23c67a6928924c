use super::{json_pretty, spin_fail, spin_ok, spinner, CommandError, EXIT_SUCCESS};
use pindep_core::{CoreError, Engine};
use pindep_schema::PackageRef;
use std::path::Path;

pub fn list(engine: &Engine, json: bool) -> Result<u8, CommandError> {
    let recipes = engine.cache().list().map_err(CoreError::from)?;
    if json {
        println!("{}", json_pretty(&recipes)?);
    } else if recipes.is_empty() {
        println!("cache is empty");
    } else {
        println!("{:<28} {:<14} BINARIES", "REFERENCE", "REVISION");
        for recipe in &recipes {
            println!(
                "{:<28} {:<14} {}",
                recipe.reference.to_string(),
                recipe.revision.short(),
                recipe.binaries.len()
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn export(engine: &Engine, recipe_dir: &Path, json: bool) -> Result<u8, CommandError> {
    let recipe = engine.export_recipe(recipe_dir)?;
    if json {
        let payload = serde_json::json!({
            "reference": recipe.reference(),
            "revision": recipe.revision(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "exported {} (revision {})",
            recipe.reference(),
            recipe.revision().short()
        );
    }
    Ok(EXIT_SUCCESS)
}

pub fn remove(
    engine: &Engine,
    reference: &PackageRef,
    binaries_only: bool,
    json: bool,
) -> Result<u8, CommandError> {
    let removed = engine
        .cache()
        .remove(reference, binaries_only)
        .map_err(CoreError::from)?;
    if json {
        let payload = serde_json::json!({
            "reference": reference,
            "binaries_removed": removed,
            "recipe_removed": !binaries_only,
        });
        println!("{}", json_pretty(&payload)?);
    } else if binaries_only {
        println!("removed {removed} binaries of {reference}");
    } else {
        println!("removed {reference} ({removed} binaries)");
    }
    Ok(EXIT_SUCCESS)
}

pub fn upload(
    engine: &Engine,
    reference: &PackageRef,
    remote: &str,
    json: bool,
) -> Result<u8, CommandError> {
    let pb = spinner(&format!("uploading {reference} to '{remote}'..."));
    let result = engine.upload(reference, remote).map_err(|e| {
        spin_fail(&pb, "upload failed");
        CommandError::from(e)
    })?;
    spin_ok(&pb, "upload complete");

    if json {
        let payload = serde_json::json!({
            "reference": result.reference,
            "remote": remote,
            "binaries_uploaded": result.binaries_uploaded,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "uploaded {} ({} binaries) to '{remote}'",
            result.reference, result.binaries_uploaded
        );
    }
    Ok(EXIT_SUCCESS)
}
