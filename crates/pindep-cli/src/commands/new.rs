use super::{json_pretty, CommandError, EXIT_MANIFEST_ERROR, EXIT_SUCCESS};
use dialoguer::{Confirm, Input, MultiSelect};
use pindep_schema::{parse_manifest_str, GeneratorKind, ManifestV1, SettingName, MANIFEST_FILE};
use std::io::{stderr, stdin, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn template_source(name: &str) -> Option<&'static str> {
    match name {
        "minimal" => Some(include_str!("../../templates/minimal.toml")),
        "grpc" => Some(include_str!("../../templates/grpc.toml")),
        _ => None,
    }
}

fn load_template(name: &str) -> Result<ManifestV1, CommandError> {
    let src = template_source(name).ok_or_else(|| {
        CommandError::failure(format!("unknown template '{name}' (expected: minimal, grpc)"))
    })?;
    parse_manifest_str(src).map_err(|e| CommandError::failure(format!("template parse error: {e}")))
}

fn prompt_err(e: dialoguer::Error) -> CommandError {
    CommandError::failure(format!("prompt failed: {e}"))
}

fn write_atomic(dest: &Path, content: &str) -> Result<(), CommandError> {
    let io_err = |what: &str, e: std::io::Error| CommandError::failure(format!("{what}: {e}"));
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| io_err("write temp file", e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| io_err("write temp file", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| io_err("fsync temp file", e))?;
    tmp.persist(dest)
        .map_err(|e| io_err("persist manifest", e.error))?;
    Ok(())
}

fn ensure_can_write(dest: &Path, force: bool, is_tty: bool) -> Result<(), CommandError> {
    if !dest.exists() || force {
        return Ok(());
    }
    let refuse = || {
        CommandError::failure(format!(
            "refusing to overwrite existing ./{MANIFEST_FILE} (pass --force)"
        ))
    };
    if !is_tty {
        return Err(refuse());
    }
    let overwrite = Confirm::new()
        .with_prompt(format!("overwrite ./{MANIFEST_FILE}?"))
        .default(false)
        .interact()
        .map_err(prompt_err)?;
    if overwrite {
        Ok(())
    } else {
        Err(refuse())
    }
}

fn prompt_manifest() -> Result<ManifestV1, CommandError> {
    let requires: String = Input::new()
        .with_prompt("requirements (space-separated name/version, empty to skip)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let names: Vec<&str> = GeneratorKind::ALL.iter().map(|g| g.as_str()).collect();
    let chosen = MultiSelect::new()
        .with_prompt("generators")
        .items(&names)
        .defaults(&[true, true])
        .interact()
        .map_err(prompt_err)?;

    Ok(ManifestV1 {
        manifest_version: 1,
        settings: SettingName::ALL.iter().map(|s| s.as_str().to_owned()).collect(),
        generators: chosen.into_iter().map(|i| names[i].to_owned()).collect(),
        requires: requires.split_whitespace().map(str::to_owned).collect(),
    })
}

pub fn run(template: Option<&str>, force: bool, json: bool) -> Result<u8, CommandError> {
    let dest = Path::new(MANIFEST_FILE);
    let is_tty = stdin().is_terminal() && stderr().is_terminal();

    let manifest = if let Some(tpl) = template {
        let m = load_template(tpl)?;
        ensure_can_write(dest, force, is_tty)?;
        m
    } else {
        ensure_can_write(dest, force, is_tty)?;
        if !is_tty {
            return Err(CommandError::failure(
                "no --template provided and stdin is not a TTY",
            ));
        }
        prompt_manifest()?
    };

    // Reject requirements typed at the prompt before anything is written.
    manifest.normalize().map_err(|e| CommandError {
        code: EXIT_MANIFEST_ERROR,
        message: format!("malformed manifest: {e}"),
    })?;

    let toml = toml::to_string_pretty(&manifest)
        .map_err(|e| CommandError::failure(format!("TOML serialization failed: {e}")))?;
    write_atomic(dest, &toml)?;

    if json {
        let payload = serde_json::json!({
            "status": "written",
            "path": format!("./{MANIFEST_FILE}"),
            "template": template,
            "requires": manifest.requires,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("wrote ./{MANIFEST_FILE}");
        if let Some(tpl) = template {
            println!("template: {tpl}");
        }
    }
    Ok(EXIT_SUCCESS)
}
