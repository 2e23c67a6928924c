use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("invalid requirement '{0}', expected '<name>/<version>'")]
    MissingVersion(String),
    #[error("invalid package name '{0}': use lowercase letters, digits, '_', '-', '+', '.'")]
    InvalidName(String),
    #[error("version of '{reference}' is not pinned: '{version}' (exact versions only)")]
    UnpinnedVersion { reference: String, version: String },
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
}

/// Package name as it appears on the left of `name/version`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    pub fn parse(s: &str) -> Result<Self, ReferenceError> {
        let valid_start = s
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        let valid_rest = s.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '+' | '.')
        });
        if !valid_start || !valid_rest {
            return Err(ReferenceError::InvalidName(s.to_owned()));
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name with every non-alphanumeric character replaced by `_`, for use in
    /// CMake variables and environment variable names.
    pub fn identifier(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Exact version string. Compared byte-for-byte; ranges are rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Version(String);

const RANGE_CHARS: &[char] = &['[', ']', '^', '~', '>', '<', '=', '*', ','];
const RESERVED_CHARS: &[char] = &['/', '\\', '@', '#', ':'];

impl Version {
    pub fn parse(s: &str) -> Result<Self, ReferenceError> {
        if s.is_empty() || s.chars().any(|c| c.is_whitespace() || RANGE_CHARS.contains(&c)) {
            return Err(ReferenceError::UnpinnedVersion {
                reference: String::new(),
                version: s.to_owned(),
            });
        }
        // Versions become cache directory names.
        if s == "." || s == ".." || s.chars().any(|c| RESERVED_CHARS.contains(&c)) {
            return Err(ReferenceError::InvalidVersion(s.to_owned()));
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A pinned `name/version` requirement.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageRef {
    pub name: PackageName,
    pub version: Version,
}

impl PackageRef {
    pub fn new(name: PackageName, version: Version) -> Self {
        Self { name, version }
    }
}

impl FromStr for PackageRef {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let Some((name, version)) = trimmed.split_once('/') else {
            return Err(ReferenceError::MissingVersion(s.to_owned()));
        };
        let name = PackageName::parse(name)?;
        let version = Version::parse(version).map_err(|e| match e {
            ReferenceError::UnpinnedVersion { version, .. } => ReferenceError::UnpinnedVersion {
                reference: trimmed.to_owned(),
                version,
            },
            other => other,
        })?;
        Ok(Self { name, version })
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

impl Serialize for PackageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
