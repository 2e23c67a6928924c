mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{CommandError, ResolveArgs};
use pindep_core::{install_signal_handler, Engine, PindepHome};
use pindep_schema::{GeneratorKind, PackageRef};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pindep",
    version,
    about = "Pinned C++ dependency resolver that writes CMake descriptors"
)]
struct Cli {
    /// Pindep home (config, profiles, package cache). Defaults to $PINDEP_HOME or ~/.pindep.
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve the manifest's requirements and write CMake descriptors.
    Install {
        /// Manifest file, or a directory containing pindep.toml.
        #[arg(default_value = "pindep.toml")]
        manifest: PathBuf,
        /// Descriptor directory (default: <manifest dir>/build/pindep).
        #[arg(short, long = "output-folder")]
        output_folder: Option<PathBuf>,
        /// Add a generator to the manifest's set. Repeatable.
        #[arg(short, long = "generator")]
        generators: Vec<GeneratorKind>,
        /// Require pindep.lock and fail if the resolution would drift from it.
        #[arg(long, default_value_t = false)]
        locked: bool,
        #[command(flatten)]
        resolve: ResolveArgs,
    },
    /// Resolve the manifest and write pindep.lock next to it.
    Lock {
        /// Manifest file, or a directory containing pindep.toml.
        #[arg(default_value = "pindep.toml")]
        manifest: PathBuf,
        #[command(flatten)]
        resolve: ResolveArgs,
    },
    /// Write a new pindep.toml in the current directory.
    New {
        /// Template to start from: minimal or grpc.
        #[arg(long)]
        template: Option<String>,
        /// Overwrite an existing pindep.toml without asking.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Manage setting profiles.
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Inspect and manage the local package cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum ProfileCommands {
    /// Detect the host platform and save it as a profile.
    Detect {
        #[arg(long, default_value = "default")]
        name: String,
        /// Overwrite an existing profile.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print a stored profile.
    Show {
        #[arg(default_value = "default")]
        name: String,
    },
    /// List stored profiles.
    List,
}

#[derive(Debug, Subcommand)]
enum CacheCommands {
    /// List cached recipes and their binaries.
    List,
    /// Export a recipe directory (recipe.toml plus files) into the cache.
    Export {
        recipe_dir: PathBuf,
    },
    /// Remove a reference from the cache.
    Remove {
        reference: PackageRef,
        /// Keep the recipe and remove only its binaries.
        #[arg(long, default_value_t = false)]
        binaries: bool,
    },
    /// Upload a cached recipe and its binaries to a configured remote.
    Upload {
        reference: PackageRef,
        /// Remote name from config.toml.
        #[arg(long)]
        remote: String,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PINDEP_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.code)
        }
    }
}

fn run(cli: Cli) -> Result<u8, CommandError> {
    let json = cli.json;
    let home = || PindepHome::locate(cli.home.as_deref()).map_err(CommandError::from);
    let engine = || -> Result<Engine, CommandError> { Ok(Engine::open(home()?)?) };

    match cli.command {
        Commands::Install {
            manifest,
            output_folder,
            generators,
            locked,
            resolve,
        } => commands::install::run(
            &engine()?,
            &manifest,
            pindep_core::InstallRequest {
                resolve: resolve.to_request(),
                generators,
                output_folder,
                locked,
            },
            json,
        ),
        Commands::Lock { manifest, resolve } => {
            commands::lock::run(&engine()?, &manifest, &resolve.to_request(), json)
        }
        Commands::New { template, force } => commands::new::run(template.as_deref(), force, json),
        Commands::Profile { command } => match command {
            ProfileCommands::Detect { name, force } => {
                commands::profile::detect(&home()?, &name, force, json)
            }
            ProfileCommands::Show { name } => commands::profile::show(&home()?, &name, json),
            ProfileCommands::List => commands::profile::list(&home()?, json),
        },
        Commands::Cache { command } => match command {
            CacheCommands::List => commands::cache::list(&engine()?, json),
            CacheCommands::Export { recipe_dir } => {
                commands::cache::export(&engine()?, &recipe_dir, json)
            }
            CacheCommands::Remove {
                reference,
                binaries,
            } => commands::cache::remove(&engine()?, &reference, binaries, json),
            CacheCommands::Upload { reference, remote } => {
                commands::cache::upload(&engine()?, &reference, &remote, json)
            }
        },
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    }
}
