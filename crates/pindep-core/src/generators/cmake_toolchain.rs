use super::cmake_deps::CMAKE_DEPS_FILE;
use super::{cmake_path, quote, Generator, HEADER};
use crate::resolver::Resolution;
use crate::CoreError;
use pindep_schema::SettingName;
use std::fmt::Write;

pub const CMAKE_TOOLCHAIN_FILE: &str = "pindep-toolchain.cmake";

/// Toolchain file carrying the resolved settings into a CMake configure.
pub struct CMakeToolchain;

fn compilers(compiler: &str) -> Option<(&'static str, &'static str)> {
    match compiler {
        "gcc" => Some(("gcc", "g++")),
        "clang" | "apple-clang" => Some(("clang", "clang++")),
        _ => None,
    }
}

fn system_processor(arch: &str) -> &str {
    match arch {
        "armv8" => "aarch64",
        "armv7" => "armv7-a",
        "x86" => "i686",
        other => other,
    }
}

impl Generator for CMakeToolchain {
    fn file_name(&self) -> &'static str {
        CMAKE_TOOLCHAIN_FILE
    }

    fn render(&self, resolution: &Resolution) -> Result<String, CoreError> {
        let settings = &resolution.settings;
        let mut out = String::from(HEADER);
        out.push('\n');

        if let Some(build_type) = settings.get(SettingName::BuildType) {
            let _ = writeln!(out, "set(CMAKE_BUILD_TYPE {})", quote(build_type)?);
        }
        if let Some(compiler) = settings.get(SettingName::Compiler) {
            match compilers(compiler) {
                Some((cc, cxx)) => {
                    let _ = writeln!(out, "set(CMAKE_C_COMPILER {})", quote(cc)?);
                    let _ = writeln!(out, "set(CMAKE_CXX_COMPILER {})", quote(cxx)?);
                }
                None => {
                    let _ = writeln!(out, "# compiler '{compiler}' is selected by the generator");
                }
            }
            let _ = writeln!(out, "set(PINDEP_COMPILER {})", quote(compiler)?);
        }
        if let Some(os) = settings.get(SettingName::Os) {
            let _ = writeln!(out, "set(PINDEP_OS {})", quote(os)?);
        }
        if let Some(arch) = settings.get(SettingName::Arch) {
            let _ = writeln!(out, "set(PINDEP_ARCH {})", quote(arch)?);
            let _ = writeln!(
                out,
                "set(CMAKE_SYSTEM_PROCESSOR {})",
                quote(system_processor(arch))?
            );
        }

        if !resolution.packages.is_empty() {
            out.push('\n');
            out.push_str("list(PREPEND CMAKE_PREFIX_PATH");
            for pkg in resolution.packages.values() {
                let _ = write!(out, "\n  {}", quote(&cmake_path(&pkg.folder)?)?);
            }
            out.push_str(")\n");
        }

        out.push('\n');
        let _ = writeln!(
            out,
            "if(EXISTS \"${{CMAKE_CURRENT_LIST_DIR}}/{CMAKE_DEPS_FILE}\")"
        );
        let _ = writeln!(out, "  include(\"${{CMAKE_CURRENT_LIST_DIR}}/{CMAKE_DEPS_FILE}\")");
        let _ = writeln!(out, "endif()");
        Ok(out)
    }
}
