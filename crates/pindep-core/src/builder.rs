use crate::CoreError;
use pindep_cache::copy_tree;
use pindep_schema::{Recipe, Settings};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Number of trailing stderr lines kept in a `BuildFailed` error.
const STDERR_TAIL_LINES: usize = 20;

/// Everything a builder needs to produce one binary package.
#[derive(Debug)]
pub struct BuildContext<'a> {
    pub recipe: &'a Recipe,
    /// Full resolved settings of the invocation.
    pub settings: &'a Settings,
    /// Files exported with the recipe, if any.
    pub export_folder: Option<&'a Path>,
    /// Package folders of the recipe's resolved requirements, in requirement order.
    pub dependency_folders: Vec<PathBuf>,
    /// Scratch directory the build runs in.
    pub build_folder: &'a Path,
    /// Directory the build must install into.
    pub package_folder: &'a Path,
}

/// Produces a package folder from a recipe.
pub trait PackageBuilder: Send + Sync {
    fn build(&self, ctx: &BuildContext<'_>) -> Result<(), CoreError>;
}

/// Runs the recipe's `[build].command` without a shell.
///
/// The build folder is seeded with the recipe's exported files. The command gets
/// `PINDEP_PACKAGE_FOLDER`, `PINDEP_SOURCE_FOLDER`, `PINDEP_PREFIX_PATH`, and one
/// `PINDEP_SETTING_<NAME>` per resolved setting.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandBuilder;

impl CommandBuilder {
    pub fn new() -> Self {
        Self
    }

    fn environment(ctx: &BuildContext<'_>) -> Result<Vec<(String, std::ffi::OsString)>, CoreError> {
        let reference = ctx.recipe.reference();
        let mut env: Vec<(String, std::ffi::OsString)> = vec![
            (
                "PINDEP_PACKAGE_FOLDER".to_owned(),
                ctx.package_folder.as_os_str().to_owned(),
            ),
            (
                "PINDEP_SOURCE_FOLDER".to_owned(),
                ctx.build_folder.as_os_str().to_owned(),
            ),
        ];
        let prefix = std::env::join_paths(&ctx.dependency_folders).map_err(|e| {
            CoreError::BuildFailed {
                reference: reference.clone(),
                reason: format!("dependency folder cannot be joined into a path list: {e}"),
            }
        })?;
        env.push(("PINDEP_PREFIX_PATH".to_owned(), prefix));
        for (name, value) in ctx.settings.iter() {
            env.push((
                format!("PINDEP_SETTING_{}", name.as_str().to_ascii_uppercase()),
                value.into(),
            ));
        }
        Ok(env)
    }
}

impl PackageBuilder for CommandBuilder {
    fn build(&self, ctx: &BuildContext<'_>) -> Result<(), CoreError> {
        let reference = ctx.recipe.reference();
        let Some(build) = &ctx.recipe.build else {
            return Err(CoreError::BuildFailed {
                reference,
                reason: "recipe has no [build] section".to_owned(),
            });
        };
        let Some((program, args)) = build.command.split_first() else {
            return Err(CoreError::BuildFailed {
                reference,
                reason: "empty build command".to_owned(),
            });
        };

        if let Some(export) = ctx.export_folder {
            copy_tree(export, ctx.build_folder)?;
        }
        std::fs::create_dir_all(ctx.build_folder)?;
        std::fs::create_dir_all(ctx.package_folder)?;

        debug!("building {reference}: {}", build.command.join(" "));
        let output = Command::new(program)
            .args(args)
            .current_dir(ctx.build_folder)
            .envs(Self::environment(ctx)?)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CoreError::BuildFailed {
                reference: reference.clone(),
                reason: format!("failed to run '{program}': {e}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            debug!("[{reference}] {line}");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            let status = output
                .status
                .code()
                .map_or_else(|| "terminated by signal".to_owned(), |c| format!("exit code {c}"));
            let reason = if tail.is_empty() {
                status
            } else {
                format!("{status}\n{tail}")
            };
            return Err(CoreError::BuildFailed { reference, reason });
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pindep_schema::{BuildSection, SettingName};
    use std::fs;

    fn recipe_with(command: &[&str]) -> Recipe {
        let mut recipe = Recipe::new(&"zlib/1.3.1".parse().unwrap());
        recipe.build = Some(BuildSection {
            command: command.iter().map(|s| (*s).to_owned()).collect(),
        });
        recipe
    }

    fn settings() -> Settings {
        Settings::new()
            .with(SettingName::Os, "Linux")
            .unwrap()
            .with(SettingName::BuildType, "Debug")
            .unwrap()
    }

    #[test]
    fn runs_command_with_environment() {
        let dir = tempfile::tempdir().unwrap();
        let export = dir.path().join("export");
        fs::create_dir_all(&export).unwrap();
        fs::write(export.join("zlib.h"), b"// zlib").unwrap();
        let build = dir.path().join("build");
        let package = dir.path().join("package");

        let recipe = recipe_with(&[
            "sh",
            "-c",
            "mkdir -p \"$PINDEP_PACKAGE_FOLDER/include\" && cp zlib.h \"$PINDEP_PACKAGE_FOLDER/include/\" && echo \"$PINDEP_SETTING_OS $PINDEP_SETTING_BUILD_TYPE\" > \"$PINDEP_PACKAGE_FOLDER/settings.txt\"",
        ]);
        let s = settings();
        let ctx = BuildContext {
            recipe: &recipe,
            settings: &s,
            export_folder: Some(&export),
            dependency_folders: Vec::new(),
            build_folder: &build,
            package_folder: &package,
        };
        CommandBuilder::new().build(&ctx).unwrap();

        assert!(package.join("include/zlib.h").is_file());
        assert_eq!(
            fs::read_to_string(package.join("settings.txt")).unwrap().trim(),
            "Linux Debug"
        );
    }

    #[test]
    fn failing_command_reports_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        let build = dir.path().join("build");
        let package = dir.path().join("package");
        let recipe = recipe_with(&["sh", "-c", "echo 'missing cmake' >&2; exit 3"]);
        let s = settings();
        let ctx = BuildContext {
            recipe: &recipe,
            settings: &s,
            export_folder: None,
            dependency_folders: Vec::new(),
            build_folder: &build,
            package_folder: &package,
        };
        let err = CommandBuilder::new().build(&ctx).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, CoreError::BuildFailed { .. }));
        assert!(msg.contains("exit code 3"), "{msg}");
        assert!(msg.contains("missing cmake"), "{msg}");
    }

    #[test]
    fn prefix_path_lists_dependency_folders() {
        let dir = tempfile::tempdir().unwrap();
        let build = dir.path().join("build");
        let package = dir.path().join("package");
        let recipe = recipe_with(&[
            "sh",
            "-c",
            "printf '%s' \"$PINDEP_PREFIX_PATH\" > \"$PINDEP_PACKAGE_FOLDER/prefix.txt\"",
        ]);
        let s = settings();
        let ctx = BuildContext {
            recipe: &recipe,
            settings: &s,
            export_folder: None,
            dependency_folders: vec![PathBuf::from("/deps/a"), PathBuf::from("/deps/b")],
            build_folder: &build,
            package_folder: &package,
        };
        CommandBuilder::new().build(&ctx).unwrap();
        assert_eq!(
            fs::read_to_string(package.join("prefix.txt")).unwrap(),
            "/deps/a:/deps/b"
        );
    }

    #[test]
    fn missing_program_is_build_failure() {
        let dir = tempfile::tempdir().unwrap();
        let build = dir.path().join("build");
        let package = dir.path().join("package");
        let recipe = recipe_with(&["pindep-no-such-program-xyz"]);
        let s = settings();
        let ctx = BuildContext {
            recipe: &recipe,
            settings: &s,
            export_folder: None,
            dependency_folders: Vec::new(),
            build_folder: &build,
            package_folder: &package,
        };
        assert!(matches!(
            CommandBuilder::new().build(&ctx),
            Err(CoreError::BuildFailed { .. })
        ));
    }
}
