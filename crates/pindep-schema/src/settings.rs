use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unknown setting '{0}' (expected one of: os, compiler, build_type, arch)")]
    UnknownSetting(String),
    #[error("invalid value for setting '{name}': '{value}'")]
    InvalidValue { name: SettingName, value: String },
    #[error("invalid setting assignment '{0}', expected '<name>=<value>'")]
    InvalidAssignment(String),
}

/// The recognized settings, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingName {
    Os,
    Compiler,
    BuildType,
    Arch,
}

impl SettingName {
    pub const ALL: [SettingName; 4] = [
        SettingName::Os,
        SettingName::Compiler,
        SettingName::BuildType,
        SettingName::Arch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingName::Os => "os",
            SettingName::Compiler => "compiler",
            SettingName::BuildType => "build_type",
            SettingName::Arch => "arch",
        }
    }
}

impl fmt::Display for SettingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingName {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "os" => Ok(SettingName::Os),
            "compiler" => Ok(SettingName::Compiler),
            "build_type" => Ok(SettingName::BuildType),
            "arch" => Ok(SettingName::Arch),
            other => Err(SettingsError::UnknownSetting(other.to_owned())),
        }
    }
}

/// Resolved setting values. Iteration is always in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct Settings {
    values: BTreeMap<SettingName, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value after validating it is non-empty and contains no whitespace.
    pub fn set(&mut self, name: SettingName, value: &str) -> Result<(), SettingsError> {
        let value = value.trim();
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(SettingsError::InvalidValue {
                name,
                value: value.to_owned(),
            });
        }
        self.values.insert(name, value.to_owned());
        Ok(())
    }

    pub fn with(mut self, name: SettingName, value: &str) -> Result<Self, SettingsError> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: SettingName) -> Option<&str> {
        self.values.get(&name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SettingName, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Names from `required` that have no value, in canonical order.
    pub fn missing(&self, required: &[SettingName]) -> Vec<SettingName> {
        let mut out: Vec<SettingName> = required
            .iter()
            .copied()
            .filter(|n| !self.values.contains_key(n))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Project onto `names`. Fails with the first missing name.
    pub fn subset(&self, names: &[SettingName]) -> Result<Settings, SettingName> {
        let mut out = Settings::new();
        for name in names {
            let value = self.values.get(name).ok_or(*name)?;
            out.values.insert(*name, value.clone());
        }
        Ok(out)
    }

    /// Parse a command-line `name=value` assignment.
    pub fn parse_assignment(input: &str) -> Result<(SettingName, String), SettingsError> {
        let Some((name, value)) = input.split_once('=') else {
            return Err(SettingsError::InvalidAssignment(input.to_owned()));
        };
        let name: SettingName = name.parse()?;
        let value = value.trim();
        if value.is_empty() {
            return Err(SettingsError::InvalidAssignment(input.to_owned()));
        }
        Ok((name, value.to_owned()))
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

impl TryFrom<BTreeMap<String, String>> for Settings {
    type Error = SettingsError;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut settings = Settings::new();
        for (name, value) in raw {
            settings.set(name.parse()?, &value)?;
        }
        Ok(settings)
    }
}

impl From<Settings> for BTreeMap<String, String> {
    fn from(settings: Settings) -> Self {
        settings
            .values
            .into_iter()
            .map(|(k, v)| (k.as_str().to_owned(), v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_gcc() -> Settings {
        Settings::new()
            .with(SettingName::Os, "Linux")
            .unwrap()
            .with(SettingName::Compiler, "gcc")
            .unwrap()
            .with(SettingName::BuildType, "Release")
            .unwrap()
            .with(SettingName::Arch, "x86_64")
            .unwrap()
    }

    #[test]
    fn parses_known_names() {
        assert_eq!("build_type".parse::<SettingName>(), Ok(SettingName::BuildType));
        assert!("compiler.version".parse::<SettingName>().is_err());
    }

    #[test]
    fn iteration_is_canonical() {
        let names: Vec<SettingName> = linux_gcc().iter().map(|(n, _)| n).collect();
        assert_eq!(names, SettingName::ALL.to_vec());
        assert_eq!(
            linux_gcc().to_string(),
            "os=Linux compiler=gcc build_type=Release arch=x86_64"
        );
    }

    #[test]
    fn rejects_blank_and_spaced_values() {
        let mut s = Settings::new();
        assert!(s.set(SettingName::Os, "  ").is_err());
        assert!(s.set(SettingName::Os, "Linux Mint").is_err());
    }

    #[test]
    fn set_overrides_existing() {
        let mut base = linux_gcc();
        base.set(SettingName::BuildType, "Debug").unwrap();
        assert_eq!(base.get(SettingName::BuildType), Some("Debug"));
        assert_eq!(base.get(SettingName::Os), Some("Linux"));
    }

    #[test]
    fn missing_reports_in_canonical_order() {
        let s = Settings::new().with(SettingName::Compiler, "gcc").unwrap();
        assert_eq!(
            s.missing(&[SettingName::Arch, SettingName::Os, SettingName::Compiler]),
            vec![SettingName::Os, SettingName::Arch]
        );
    }

    #[test]
    fn subset_projects_and_reports_missing() {
        let s = linux_gcc();
        let key = s.subset(&[SettingName::Os, SettingName::Arch]).unwrap();
        assert_eq!(key.iter().count(), 2);
        assert_eq!(key.get(SettingName::Compiler), None);

        let partial = Settings::new().with(SettingName::Os, "Linux").unwrap();
        assert_eq!(
            partial.subset(&[SettingName::Os, SettingName::Compiler]),
            Err(SettingName::Compiler)
        );
    }

    #[test]
    fn parses_assignment() {
        assert_eq!(
            Settings::parse_assignment("arch=armv8").unwrap(),
            (SettingName::Arch, "armv8".to_owned())
        );
        assert!(Settings::parse_assignment("arch").is_err());
        assert!(Settings::parse_assignment("arch=").is_err());
        assert!(Settings::parse_assignment("cppstd=17").is_err());
    }

    #[test]
    fn toml_table_roundtrip() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            settings: Settings,
        }
        let w = Wrapper {
            settings: linux_gcc(),
        };
        let text = toml::to_string(&w).unwrap();
        assert!(text.contains("build_type = \"Release\""));
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.settings, linux_gcc());
    }

    #[test]
    fn unknown_key_rejected_on_deserialize() {
        let raw: BTreeMap<String, String> =
            [("libcxx".to_owned(), "libstdc++11".to_owned())].into();
        assert!(Settings::try_from(raw).is_err());
    }
}
