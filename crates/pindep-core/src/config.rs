use crate::CoreError;
use pindep_remote::RemoteConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the configuration file inside the pindep home.
pub const CONFIG_FILE: &str = "config.toml";

/// What to do when no prebuilt binary matches the settings key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPolicy {
    /// Fail with `IncompatibleSettings`.
    #[default]
    Never,
    /// Build from source when the recipe has a `[build]` section.
    Missing,
}

impl fmt::Display for BuildPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildPolicy::Never => f.write_str("never"),
            BuildPolicy::Missing => f.write_str("missing"),
        }
    }
}

impl FromStr for BuildPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(BuildPolicy::Never),
            "missing" => Ok(BuildPolicy::Missing),
            other => Err(format!("unknown build policy '{other}' (expected never or missing)")),
        }
    }
}

/// `$PINDEP_HOME/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PindepConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub build: BuildPolicy,
    #[serde(default)]
    pub remotes: Vec<RemoteConfig>,
}

impl PindepConfig {
    /// Load the config; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let content =
            toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| CoreError::Io(e.error))?;
        Ok(())
    }

    pub fn remote(&self, name: &str) -> Option<&RemoteConfig> {
        self.remotes.iter().find(|r| r.name == name)
    }

    fn validate(&self) -> Result<(), CoreError> {
        let mut names: Vec<&str> = Vec::with_capacity(self.remotes.len());
        for remote in &self.remotes {
            if remote.name.trim().is_empty() {
                return Err(CoreError::Config("remote with empty name".to_owned()));
            }
            if !(remote.url.starts_with("http://") || remote.url.starts_with("https://")) {
                return Err(CoreError::Config(format!(
                    "remote '{}' has unsupported url '{}'",
                    remote.name, remote.url
                )));
            }
            if names.contains(&remote.name.as_str()) {
                return Err(CoreError::Config(format!(
                    "remote '{}' is defined more than once",
                    remote.name
                )));
            }
            names.push(&remote.name);
        }
        Ok(())
    }
}

/// The pindep home directory: config, profiles, and the package cache.
///
/// ```text
/// <home>/config.toml
/// <home>/profiles/<name>
/// <home>/p/            package cache
/// ```
#[derive(Debug, Clone)]
pub struct PindepHome {
    root: PathBuf,
}

impl PindepHome {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Explicit path, else `$PINDEP_HOME`, else `~/.pindep`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, CoreError> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        if let Some(home) = std::env::var_os("PINDEP_HOME").filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(home)));
        }
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .ok_or_else(|| {
                CoreError::Config("cannot locate home directory; set PINDEP_HOME".to_owned())
            })?;
        Ok(Self::new(PathBuf::from(home).join(".pindep")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.root.join("profiles")
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir().join(name)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("p")
    }

    /// Names of stored profiles, sorted.
    pub fn list_profiles(&self) -> Result<Vec<String>, CoreError> {
        let dir = self.profiles_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Profile names become file names.
pub fn validate_profile_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() || name.len() > 64 {
        return Err(CoreError::Config(
            "profile name must be 1-64 characters".to_owned(),
        ));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
        || name.starts_with('.')
    {
        return Err(CoreError::Config(format!(
            "invalid profile name '{name}': use [a-zA-Z0-9_.-]"
        )));
    }
    Ok(())
}
