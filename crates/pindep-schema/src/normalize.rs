use crate::generator::GeneratorKind;
use crate::manifest::{ManifestError, ManifestV1};
use crate::reference::PackageRef;
use crate::settings::SettingName;
use std::collections::BTreeMap;

/// Validated manifest: typed settings declaration, parsed requirements in
/// declaration order, deduplicated generator set.
///
/// This is the input to resolution; it is never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedManifest {
    pub manifest_version: u32,
    pub settings: Vec<SettingName>,
    pub generators: Vec<GeneratorKind>,
    pub requires: Vec<PackageRef>,
}

impl ManifestV1 {
    /// Normalize the manifest: validate every declaration.
    pub fn normalize(&self) -> Result<NormalizedManifest, ManifestError> {
        if self.manifest_version != 1 {
            return Err(ManifestError::UnsupportedVersion(self.manifest_version));
        }

        let mut settings = Vec::with_capacity(self.settings.len());
        for raw in &self.settings {
            let name: SettingName = raw.parse()?;
            if settings.contains(&name) {
                return Err(ManifestError::DuplicateSetting(name.to_string()));
            }
            settings.push(name);
        }

        let mut generators = Vec::with_capacity(self.generators.len());
        for raw in &self.generators {
            let kind: GeneratorKind = raw.parse().map_err(ManifestError::UnknownGenerator)?;
            if !generators.contains(&kind) {
                generators.push(kind);
            }
        }

        let mut requires: Vec<PackageRef> = Vec::with_capacity(self.requires.len());
        let mut seen: BTreeMap<String, String> = BTreeMap::new();
        for raw in &self.requires {
            let reference: PackageRef = raw.parse()?;
            if let Some(first) = seen.get(reference.name.as_str()) {
                return Err(ManifestError::DuplicateRequirement {
                    name: reference.name.to_string(),
                    first: first.clone(),
                    second: reference.to_string(),
                });
            }
            seen.insert(reference.name.to_string(), reference.to_string());
            requires.push(reference);
        }

        Ok(NormalizedManifest {
            manifest_version: self.manifest_version,
            settings,
            generators,
            requires,
        })
    }
}

impl NormalizedManifest {
    /// Add generators requested outside the manifest, keeping the manifest's
    /// order and appending new ones.
    pub fn with_extra_generators(mut self, extra: &[GeneratorKind]) -> Self {
        for kind in extra {
            if !self.generators.contains(kind) {
                self.generators.push(*kind);
            }
        }
        self
    }
}
