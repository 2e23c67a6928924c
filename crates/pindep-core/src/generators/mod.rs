//! Descriptor generators.

mod cmake_deps;
mod cmake_toolchain;

pub use cmake_deps::{CMakeDeps, CMAKE_DEPS_FILE};
pub use cmake_toolchain::{CMakeToolchain, CMAKE_TOOLCHAIN_FILE};

use crate::resolver::Resolution;
use crate::CoreError;
use pindep_schema::GeneratorKind;
use std::path::Path;

const HEADER: &str = "# Generated by pindep. Do not edit.\n";

/// Every file a generator can write. Output folders are cleaned of these when
/// their generator is not requested.
pub const DESCRIPTOR_FILES: [&str; 2] = [CMAKE_DEPS_FILE, CMAKE_TOOLCHAIN_FILE];

/// Renders one descriptor file from a resolution.
pub trait Generator {
    fn file_name(&self) -> &'static str;

    fn render(&self, resolution: &Resolution) -> Result<String, CoreError>;
}

/// A rendered descriptor, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub file_name: &'static str,
    pub contents: String,
}

pub fn generator_for(kind: GeneratorKind) -> Box<dyn Generator> {
    match kind {
        GeneratorKind::CMakeDeps => Box::new(CMakeDeps),
        GeneratorKind::CMakeToolchain => Box::new(CMakeToolchain),
    }
}

/// Render every requested generator in memory, in request order.
pub fn render_all(
    kinds: &[GeneratorKind],
    resolution: &Resolution,
) -> Result<Vec<RenderedFile>, CoreError> {
    kinds
        .iter()
        .map(|kind| {
            let generator = generator_for(*kind);
            Ok(RenderedFile {
                file_name: generator.file_name(),
                contents: generator.render(resolution)?,
            })
        })
        .collect()
}

/// Quote a value as a CMake string argument.
fn quote(value: &str) -> Result<String, CoreError> {
    if value.contains(['\n', '\r']) {
        return Err(CoreError::Generator(format!(
            "value {value:?} contains a line break"
        )));
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$");
    Ok(format!("\"{escaped}\""))
}

/// Quote a `;`-separated CMake list.
fn quote_list<S: AsRef<str>>(items: &[S]) -> Result<String, CoreError> {
    for item in items {
        if item.as_ref().contains(';') {
            return Err(CoreError::Generator(format!(
                "list item {:?} contains ';'",
                item.as_ref()
            )));
        }
    }
    let joined: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
    quote(&joined.join(";"))
}

/// Forward-slash path string, as CMake expects on every platform.
fn cmake_path(path: &Path) -> Result<String, CoreError> {
    let s = path.to_str().ok_or_else(|| {
        CoreError::Generator(format!("path is not valid UTF-8: {}", path.display()))
    })?;
    Ok(s.replace('\\', "/"))
}
