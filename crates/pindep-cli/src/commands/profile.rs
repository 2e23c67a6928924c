use super::{json_pretty, CommandError, EXIT_SUCCESS};
use pindep_core::config::validate_profile_name;
use pindep_core::{CoreError, PindepHome};
use pindep_schema::{detect_host, Profile};

pub fn detect(home: &PindepHome, name: &str, force: bool, json: bool) -> Result<u8, CommandError> {
    validate_profile_name(name)?;
    let path = home.profile_path(name);
    if path.exists() && !force {
        return Err(CommandError::failure(format!(
            "profile '{name}' already exists at {} (pass --force)",
            path.display()
        )));
    }
    let profile = detect_host().map_err(CoreError::from)?;
    profile.save(&path).map_err(CoreError::from)?;

    if json {
        let payload = serde_json::json!({
            "name": name,
            "path": path,
            "settings": profile.settings,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("detected profile '{name}': {}", profile.settings);
        println!("saved to {}", path.display());
    }
    Ok(EXIT_SUCCESS)
}

pub fn show(home: &PindepHome, name: &str, json: bool) -> Result<u8, CommandError> {
    validate_profile_name(name)?;
    let profile = Profile::load(home.profile_path(name)).map_err(CoreError::from)?;
    if json {
        println!("{}", json_pretty(&profile)?);
    } else {
        println!("[{name}]");
        for (setting, value) in profile.settings.iter() {
            println!("{setting}={value}");
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn list(home: &PindepHome, json: bool) -> Result<u8, CommandError> {
    let names = home.list_profiles()?;
    if json {
        println!("{}", json_pretty(&names)?);
    } else if names.is_empty() {
        println!("no profiles found; run 'pindep profile detect'");
    } else {
        for name in &names {
            println!("{name}");
        }
    }
    Ok(EXIT_SUCCESS)
}
