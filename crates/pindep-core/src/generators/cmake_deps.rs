use super::{cmake_path, quote, quote_list, Generator, HEADER};
use crate::resolver::{Resolution, ResolvedPackage};
use crate::CoreError;
use pindep_schema::PackageName;
use std::collections::BTreeMap;
use std::fmt::Write;

pub const CMAKE_DEPS_FILE: &str = "pindep-deps.cmake";

/// Per-package variables and an `INTERFACE IMPORTED` target for each package.
pub struct CMakeDeps;

impl Generator for CMakeDeps {
    fn file_name(&self) -> &'static str {
        CMAKE_DEPS_FILE
    }

    fn render(&self, resolution: &Resolution) -> Result<String, CoreError> {
        let mut out = String::from(HEADER);
        let _ = writeln!(out, "# settings: {}", resolution.settings);
        out.push('\n');

        check_unique_names(resolution)?;
        let names: Vec<&str> = resolution.packages.keys().map(PackageName::as_str).collect();
        let _ = writeln!(out, "set(PINDEP_PACKAGES {})", quote_list(&names)?);

        for pkg in resolution.packages.values() {
            out.push('\n');
            render_package(&mut out, pkg, resolution)?;
        }
        Ok(out)
    }
}

/// Distinct packages must not share a variable prefix or a target name.
fn check_unique_names(resolution: &Resolution) -> Result<(), CoreError> {
    let mut prefixes: BTreeMap<String, &PackageName> = BTreeMap::new();
    let mut targets: BTreeMap<&str, &PackageName> = BTreeMap::new();
    for (name, pkg) in &resolution.packages {
        if let Some(other) = prefixes.insert(name.identifier(), name) {
            return Err(CoreError::Generator(format!(
                "packages '{other}' and '{name}' both map to CMake variable prefix '{}'",
                name.identifier()
            )));
        }
        if let Some(other) = targets.insert(pkg.target_name.as_str(), name) {
            return Err(CoreError::Generator(format!(
                "packages '{other}' and '{name}' both declare CMake target '{}'",
                pkg.target_name
            )));
        }
    }
    Ok(())
}

fn render_package(
    out: &mut String,
    pkg: &ResolvedPackage,
    resolution: &Resolution,
) -> Result<(), CoreError> {
    let var = pkg.reference.name.identifier();
    let folder = cmake_path(&pkg.folder)?;
    let info = &pkg.cpp_info;
    let include_dirs: Vec<String> = info
        .includedirs
        .iter()
        .map(|d| format!("{folder}/{d}"))
        .collect();
    let lib_dirs: Vec<String> = info
        .libdirs
        .iter()
        .map(|d| format!("{folder}/{d}"))
        .collect();

    let _ = writeln!(out, "# {}", pkg.reference);
    let _ = writeln!(out, "set({var}_VERSION {})", quote(pkg.reference.version.as_str())?);
    let _ = writeln!(out, "set({var}_PACKAGE_ID {})", quote(pkg.package_id.as_str())?);
    let _ = writeln!(out, "set({var}_PACKAGE_FOLDER {})", quote(&folder)?);
    let _ = writeln!(out, "set({var}_INCLUDE_DIRS {})", quote_list(&include_dirs)?);
    let _ = writeln!(out, "set({var}_LIB_DIRS {})", quote_list(&lib_dirs)?);
    let _ = writeln!(out, "set({var}_LIBS {})", quote_list(&info.libs)?);
    let _ = writeln!(out, "set({var}_SYSTEM_LIBS {})", quote_list(&info.system_libs)?);
    let _ = writeln!(out, "set({var}_DEFINITIONS {})", quote_list(&info.defines)?);

    let mut link = vec![format!("${{{var}_LIBS}}"), format!("${{{var}_SYSTEM_LIBS}}")];
    for dep in &pkg.requires {
        let dep_pkg = resolution.get(&dep.name).ok_or_else(|| {
            CoreError::Generator(format!("{} requires {dep}, which is not resolved", pkg.reference))
        })?;
        link.push(dep_pkg.target_name.clone());
    }

    let target = &pkg.target_name;
    let _ = writeln!(out, "if(NOT TARGET {target})");
    let _ = writeln!(out, "  add_library({target} INTERFACE IMPORTED)");
    let _ = writeln!(out, "  set_target_properties({target} PROPERTIES");
    let _ = writeln!(out, "    INTERFACE_INCLUDE_DIRECTORIES \"${{{var}_INCLUDE_DIRS}}\"");
    let _ = writeln!(out, "    INTERFACE_LINK_DIRECTORIES \"${{{var}_LIB_DIRS}}\"");
    let _ = writeln!(out, "    INTERFACE_LINK_LIBRARIES \"{}\"", link.join(";"));
    let _ = writeln!(out, "    INTERFACE_COMPILE_DEFINITIONS \"${{{var}_DEFINITIONS}}\")");
    let _ = writeln!(out, "endif()");
    Ok(())
}
