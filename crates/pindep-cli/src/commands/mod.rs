pub mod cache;
pub mod completions;
pub mod install;
pub mod lock;
pub mod new;
pub mod profile;

use indicatif::{ProgressBar, ProgressStyle};
use pindep_core::{BuildPolicy, CoreError, ResolveRequest};
use pindep_schema::{SettingName, Settings, SettingsError};
use std::fmt;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_CACHE_ERROR: u8 = 3;
pub const EXIT_UNRESOLVED: u8 = 4;
pub const EXIT_INCOMPATIBLE: u8 = 5;

/// A failed command: the message for stderr and the process exit code.
#[derive(Debug)]
pub struct CommandError {
    pub code: u8,
    pub message: String,
}

impl CommandError {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: EXIT_FAILURE,
            message: message.into(),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<CoreError> for CommandError {
    fn from(err: CoreError) -> Self {
        Self {
            code: exit_code(&err),
            message: err.to_string(),
        }
    }
}

pub fn exit_code(err: &CoreError) -> u8 {
    match err {
        CoreError::MalformedManifest(_) | CoreError::Generator(_) => EXIT_MANIFEST_ERROR,
        CoreError::Cache(_) => EXIT_CACHE_ERROR,
        CoreError::UnresolvedDependency { .. } => EXIT_UNRESOLVED,
        CoreError::IncompatibleSettings { .. } => EXIT_INCOMPATIBLE,
        _ => EXIT_FAILURE,
    }
}

/// Resolution flags shared by `install` and `lock`.
#[derive(Debug, Clone, clap::Args)]
pub struct ResolveArgs {
    /// Profile to take setting defaults from.
    #[arg(short, long)]
    pub profile: Option<String>,
    /// Override one setting, e.g. `-s build_type=Debug`. Repeatable.
    #[arg(short = 's', long = "setting", value_parser = parse_setting)]
    pub settings: Vec<(SettingName, String)>,
    /// Build policy when no prebuilt binary matches: never or missing.
    #[arg(long, value_parser = parse_build_policy)]
    pub build: Option<BuildPolicy>,
    /// Never contact remotes.
    #[arg(long, default_value_t = false)]
    pub offline: bool,
}

impl ResolveArgs {
    pub fn to_request(&self) -> ResolveRequest {
        ResolveRequest {
            profile: self.profile.clone(),
            settings: self.settings.clone(),
            build_policy: self.build,
            offline: self.offline,
        }
    }
}

fn parse_setting(s: &str) -> Result<(SettingName, String), SettingsError> {
    Settings::parse_assignment(s)
}

fn parse_build_policy(s: &str) -> Result<BuildPolicy, String> {
    s.parse()
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, CommandError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CommandError::failure(format!("JSON serialization failed: {e}")))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

/// Spinner for human output; `None` under `--json`.
pub fn maybe_spinner(json: bool, msg: &str) -> Option<ProgressBar> {
    if json {
        None
    } else {
        Some(spinner(msg))
    }
}

pub fn colorize_origin(origin: &str) -> String {
    use console::Style;
    match origin {
        "cache" => Style::new().green().apply_to(origin).to_string(),
        "remote" => Style::new().cyan().apply_to(origin).to_string(),
        "build" => Style::new().yellow().bold().apply_to(origin).to_string(),
        other => other.to_owned(),
    }
}
