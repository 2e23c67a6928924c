use crate::reference::{PackageName, PackageRef, Version};
use crate::settings::SettingName;
use crate::types::RecipeRevision;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name of a recipe inside a recipe directory.
pub const RECIPE_FILE: &str = "recipe.toml";

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("failed to read recipe: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse recipe: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize recipe: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("recipe {0}: build.command must not be empty")]
    EmptyBuildCommand(PackageRef),
    #[error("recipe {0} requires itself")]
    SelfRequirement(PackageRef),
    #[error("recipe {recipe} requires '{name}' more than once")]
    DuplicateRequirement { recipe: PackageRef, name: String },
    #[error("recipe {recipe}: invalid cmake_target_name '{target}'")]
    InvalidTargetName { recipe: PackageRef, target: String },
    #[error("recipe {recipe}: {field} entry '{dir}' must be a relative path inside the package folder")]
    InvalidDirectory {
        recipe: PackageRef,
        field: &'static str,
        dir: String,
    },
}

/// How a `name/version` is packaged, and optionally built from source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    pub name: PackageName,
    pub version: Version,
    /// Settings the binaries of this recipe depend on. Empty for
    /// settings-independent packages.
    #[serde(default = "all_settings")]
    pub settings: Vec<SettingName>,
    #[serde(default)]
    pub requires: Vec<PackageRef>,
    #[serde(default)]
    pub cpp_info: CppInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSection>,
}

/// Consumer-facing usage information, relative to the package folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CppInfo {
    #[serde(default = "default_includedirs")]
    pub includedirs: Vec<String>,
    #[serde(default = "default_libdirs")]
    pub libdirs: Vec<String>,
    #[serde(default)]
    pub libs: Vec<String>,
    #[serde(default)]
    pub system_libs: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmake_target_name: Option<String>,
}

impl Default for CppInfo {
    fn default() -> Self {
        Self {
            includedirs: default_includedirs(),
            libdirs: default_libdirs(),
            libs: Vec::new(),
            system_libs: Vec::new(),
            defines: Vec::new(),
            cmake_target_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Program and arguments. Run without a shell.
    pub command: Vec<String>,
}

fn all_settings() -> Vec<SettingName> {
    SettingName::ALL.to_vec()
}

fn default_includedirs() -> Vec<String> {
    vec!["include".to_owned()]
}

fn default_libdirs() -> Vec<String> {
    vec!["lib".to_owned()]
}

impl Recipe {
    /// A recipe with default usage info, all settings, no requirements and no build.
    pub fn new(reference: &PackageRef) -> Self {
        Self {
            name: reference.name.clone(),
            version: reference.version.clone(),
            settings: all_settings(),
            requires: Vec::new(),
            cpp_info: CppInfo::default(),
            build: None,
        }
    }

    pub fn reference(&self) -> PackageRef {
        PackageRef::new(self.name.clone(), self.version.clone())
    }

    pub fn is_buildable(&self) -> bool {
        self.build.is_some()
    }

    /// CMake target exposed to consumers.
    pub fn target_name(&self) -> String {
        self.cpp_info
            .cmake_target_name
            .clone()
            .unwrap_or_else(|| format!("{0}::{0}", self.name))
    }

    /// Validate and canonicalize: settings sorted and deduplicated.
    pub fn validated(mut self) -> Result<Self, RecipeError> {
        let reference = self.reference();
        self.settings.sort();
        self.settings.dedup();

        let mut seen: Vec<&str> = Vec::with_capacity(self.requires.len());
        for req in &self.requires {
            if req.name == self.name {
                return Err(RecipeError::SelfRequirement(reference));
            }
            if seen.contains(&req.name.as_str()) {
                return Err(RecipeError::DuplicateRequirement {
                    recipe: reference,
                    name: req.name.to_string(),
                });
            }
            seen.push(req.name.as_str());
        }

        if let Some(build) = &self.build {
            if build.command.is_empty() || build.command[0].trim().is_empty() {
                return Err(RecipeError::EmptyBuildCommand(reference));
            }
        }

        if let Some(target) = &self.cpp_info.cmake_target_name {
            if !is_valid_target_name(target) {
                return Err(RecipeError::InvalidTargetName {
                    recipe: reference,
                    target: target.clone(),
                });
            }
        }
        for (field, dirs) in [
            ("includedirs", &self.cpp_info.includedirs),
            ("libdirs", &self.cpp_info.libdirs),
        ] {
            if let Some(dir) = dirs.iter().find(|d| !is_package_relative(d)) {
                return Err(RecipeError::InvalidDirectory {
                    recipe: reference,
                    field,
                    dir: dir.clone(),
                });
            }
        }
        Ok(self)
    }

    /// Content digest of the canonical form. Changes whenever any field changes.
    pub fn revision(&self) -> RecipeRevision {
        let mut hasher = blake3::Hasher::new();
        let mut line = |tag: &str, value: &str| {
            hasher.update(format!("{tag}:{value}\n").as_bytes());
        };

        line("ref", &self.reference().to_string());
        for setting in &self.settings {
            line("setting", setting.as_str());
        }
        for req in &self.requires {
            line("require", &req.to_string());
        }
        let info = &self.cpp_info;
        for dir in &info.includedirs {
            line("includedir", dir);
        }
        for dir in &info.libdirs {
            line("libdir", dir);
        }
        for lib in &info.libs {
            line("lib", lib);
        }
        for lib in &info.system_libs {
            line("system_lib", lib);
        }
        for define in &info.defines {
            line("define", define);
        }
        if let Some(target) = &info.cmake_target_name {
            line("target", target);
        }
        if let Some(build) = &self.build {
            for arg in &build.command {
                line("build", arg);
            }
        }

        RecipeRevision::new(hasher.finalize().to_hex().to_string())
    }

    pub fn to_toml(&self) -> Result<String, RecipeError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Letters, digits, `_ . + -`, and `::` namespace separators.
fn is_valid_target_name(target: &str) -> bool {
    !target.is_empty()
        && target.split("::").all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'))
        })
}

/// Relative, forward-slash, and never leaving the folder it is joined to.
fn is_package_relative(dir: &str) -> bool {
    !dir.is_empty()
        && !dir.starts_with('/')
        && !dir.contains(['\\', ':', ';', '"', '$'])
        && dir.split('/').all(|part| !part.is_empty() && part != "..")
}

pub fn parse_recipe_str(input: &str) -> Result<Recipe, RecipeError> {
    let recipe: Recipe = toml::from_str(input)?;
    recipe.validated()
}

pub fn parse_recipe_file(path: impl AsRef<Path>) -> Result<Recipe, RecipeError> {
    let content = fs::read_to_string(path)?;
    parse_recipe_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRPC: &str = r#"
name = "grpc"
version = "1.54.3"
requires = ["protobuf/3.21.12"]

[cpp_info]
libs = ["grpc++", "grpc", "gpr"]
system_libs = ["pthread"]
defines = ["GRPC_STATIC"]
cmake_target_name = "gRPC::grpc++"
"#;

    #[test]
    fn parses_recipe_with_defaults() {
        let recipe = parse_recipe_str(GRPC).unwrap();
        assert_eq!(recipe.reference().to_string(), "grpc/1.54.3");
        assert_eq!(recipe.settings, SettingName::ALL.to_vec());
        assert_eq!(recipe.cpp_info.includedirs, vec!["include"]);
        assert_eq!(recipe.cpp_info.libdirs, vec!["lib"]);
        assert_eq!(recipe.target_name(), "gRPC::grpc++");
        assert!(!recipe.is_buildable());
    }

    #[test]
    fn default_target_name_uses_package_name() {
        let r = Recipe::new(&"sfml/2.6.1".parse().unwrap());
        assert_eq!(r.target_name(), "sfml::sfml");
    }

    #[test]
    fn header_only_recipe_has_no_settings() {
        let recipe = parse_recipe_str(
            r#"
name = "nlohmann_json"
version = "3.11.3"
settings = []
[cpp_info]
libdirs = []
"#,
        )
        .unwrap();
        assert!(recipe.settings.is_empty());
        assert!(recipe.cpp_info.libdirs.is_empty());
    }

    #[test]
    fn revision_is_stable_and_content_sensitive() {
        let a = parse_recipe_str(GRPC).unwrap();
        let b = parse_recipe_str(GRPC).unwrap();
        assert_eq!(a.revision(), b.revision());
        assert_eq!(a.revision().len(), 64);

        let mut c = b.clone();
        c.cpp_info.defines.push("EXTRA".to_owned());
        assert_ne!(a.revision(), c.revision());
    }

    #[test]
    fn settings_order_does_not_change_revision() {
        let a = parse_recipe_str("name = \"zlib\"\nversion = \"1.3.1\"\nsettings = [\"arch\", \"os\"]")
            .unwrap();
        let b = parse_recipe_str("name = \"zlib\"\nversion = \"1.3.1\"\nsettings = [\"os\", \"arch\"]")
            .unwrap();
        assert_eq!(a.revision(), b.revision());
    }

    #[test]
    fn rejects_empty_build_command() {
        let err = parse_recipe_str("name = \"zlib\"\nversion = \"1.3.1\"\n[build]\ncommand = []")
            .unwrap_err();
        assert!(matches!(err, RecipeError::EmptyBuildCommand(_)));
    }

    #[test]
    fn rejects_self_requirement() {
        let err = parse_recipe_str("name = \"zlib\"\nversion = \"1.3.1\"\nrequires = [\"zlib/1.3.0\"]")
            .unwrap_err();
        assert!(matches!(err, RecipeError::SelfRequirement(_)));
    }

    #[test]
    fn rejects_unsafe_target_names() {
        for target in ["", "my lib", "a)b", "x\"y", "::zlib", "ZLIB::", "a${B}"] {
            let text = format!(
                "name = \"zlib\"\nversion = \"1.3.1\"\n[cpp_info]\ncmake_target_name = {}",
                toml::Value::String(target.to_owned())
            );
            assert!(
                matches!(parse_recipe_str(&text), Err(RecipeError::InvalidTargetName { .. })),
                "accepted {target:?}"
            );
        }
        let ok = parse_recipe_str(
            "name = \"grpc\"\nversion = \"1.54.3\"\n[cpp_info]\ncmake_target_name = \"gRPC::grpc++\"",
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn rejects_directories_escaping_package_folder() {
        for (field, dir) in [
            ("includedirs", "/usr/include"),
            ("includedirs", "../other/include"),
            ("libdirs", "lib/../../etc"),
            ("libdirs", "C:\\lib"),
            ("includedirs", ""),
        ] {
            let text = format!(
                "name = \"zlib\"\nversion = \"1.3.1\"\n[cpp_info]\n{field} = [{}]",
                toml::Value::String(dir.to_owned())
            );
            match parse_recipe_str(&text) {
                Err(RecipeError::InvalidDirectory { field: f, .. }) => assert_eq!(f, field),
                other => panic!("accepted {dir:?}: {other:?}"),
            }
        }
        let nested = parse_recipe_str(
            "name = \"zlib\"\nversion = \"1.3.1\"\n[cpp_info]\nincludedirs = [\"include/zlib\"]",
        )
        .unwrap();
        assert_eq!(nested.cpp_info.includedirs, vec!["include/zlib"]);
    }

    #[test]
    fn rejects_unknown_recipe_setting() {
        assert!(parse_recipe_str("name = \"zlib\"\nversion = \"1.3.1\"\nsettings = [\"cppstd\"]").is_err());
    }

    #[test]
    fn toml_roundtrip_preserves_revision() {
        let recipe = parse_recipe_str(GRPC).unwrap();
        let text = recipe.to_toml().unwrap();
        let back = parse_recipe_str(&text).unwrap();
        assert_eq!(back, recipe);
        assert_eq!(back.revision(), recipe.revision());
    }
}
