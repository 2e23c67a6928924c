use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Descriptor output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GeneratorKind {
    CMakeDeps,
    CMakeToolchain,
}

impl GeneratorKind {
    pub const ALL: [GeneratorKind; 2] = [GeneratorKind::CMakeDeps, GeneratorKind::CMakeToolchain];

    pub fn as_str(self) -> &'static str {
        match self {
            GeneratorKind::CMakeDeps => "CMakeDeps",
            GeneratorKind::CMakeToolchain => "CMakeToolchain",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeneratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CMakeDeps" => Ok(GeneratorKind::CMakeDeps),
            "CMakeToolchain" => Ok(GeneratorKind::CMakeToolchain),
            other => Err(other.to_owned()),
        }
    }
}
