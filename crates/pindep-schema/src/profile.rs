use crate::settings::{SettingName, Settings, SettingsError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse profile: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize profile: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid profile setting: {0}")]
    Settings(#[from] SettingsError),
    #[error("profile not found: {0}")]
    NotFound(String),
}

/// Stored default setting values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    #[serde(default)]
    pub settings: Settings,
}

impl Profile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ProfileError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        parse_profile_str(&content)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProfileError> {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let content = toml::to_string_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| ProfileError::Io(e.error))?;
        Ok(())
    }
}

pub fn parse_profile_str(input: &str) -> Result<Profile, ProfileError> {
    Ok(toml::from_str(input)?)
}

/// Detect the host profile from the running platform and the `CC` variable.
pub fn detect_host() -> Result<Profile, ProfileError> {
    let cc = std::env::var("CC").ok();
    detect_with(std::env::consts::OS, std::env::consts::ARCH, cc.as_deref())
}

/// Platform detection with explicit inputs, so it can be tested off-host.
pub fn detect_with(os: &str, arch: &str, cc: Option<&str>) -> Result<Profile, ProfileError> {
    let os = match os {
        "linux" => "Linux",
        "macos" => "Macos",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        "android" => "Android",
        other => other,
    };
    let arch = match arch {
        "x86_64" => "x86_64",
        "aarch64" => "armv8",
        "x86" => "x86",
        "arm" => "armv7",
        other => other,
    };
    let compiler = cc
        .and_then(|cc| compiler_from_cc(cc, os))
        .unwrap_or_else(|| default_compiler(os).to_owned());

    let settings = Settings::new()
        .with(SettingName::Os, os)?
        .with(SettingName::Compiler, &compiler)?
        .with(SettingName::BuildType, "Release")?
        .with(SettingName::Arch, arch)?;
    Ok(Profile { settings })
}

fn compiler_from_cc(cc: &str, os: &str) -> Option<String> {
    let base = Path::new(cc.trim()).file_name()?.to_str()?.to_ascii_lowercase();
    let base = base.strip_suffix(".exe").unwrap_or(&base);
    if base.is_empty() {
        return None;
    }
    let name = if base.contains("clang") {
        if os == "Macos" {
            "apple-clang"
        } else {
            "clang"
        }
    } else if base.contains("gcc") || base.contains("g++") || base == "cc" {
        "gcc"
    } else if base == "cl" {
        "msvc"
    } else {
        base
    };
    Some(name.to_owned())
}

fn default_compiler(os: &str) -> &'static str {
    match os {
        "Macos" => "apple-clang",
        "Windows" => "msvc",
        "FreeBSD" => "clang",
        _ => "gcc",
    }
}
