//! installer-cli - Drive the game install orchestrator from a terminal
//!
//! # Commands
//!
//! - `installer-cli install <archive>` - Stage, install and resolve a title
//! - `installer-cli classify <archive>` - Report installer vs portable
//! - `installer-cli resolve <dir>` - Resolve the executable of an installed title
//! - `installer-cli arch <exe>` - Print the CPU architecture of an executable
//!
//! # Environment
//!
//! A `.env` file is honored. `INSTALLER_SETTINGS` points at the JSON settings
//! file and `INSTALLER_TEMP_DIR` overrides the staging root. `RUST_LOG`
//! controls log filtering.

mod prompt;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use installer::detect::arch::{self, is_64bit_host};
use installer::detect::classify::classify_with_fallback;
use installer::{
    AutoConfirm, ConfiguredDestinations, ConfirmDialog, DirectoryExtractor, ExecutableResolution, Extractor,
    InstallOutcome, InstallProgress, InstallRequest, Installer, InstallerConfig, InstallerMode, InstallerSettings,
    PlatformRef, SevenZipExtractor,
};

use crate::prompt::ConsolePrompt;

/// Install PC game archives
#[derive(Parser)]
#[command(name = "installer-cli")]
#[command(about = "Install PC game archives: classify, run installers and resolve executables")]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (defaults to $INSTALLER_SETTINGS)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage, install and resolve a title
    Install(InstallArgs),

    /// Report whether an archive ships an installer or is portable
    Classify {
        archive: PathBuf,
        /// Already extracted tree to inspect instead of extracting
        #[arg(long)]
        extracted: Option<PathBuf>,
        /// 7-Zip executable used for probe extraction
        #[arg(long, default_value = "7z")]
        seven_zip: PathBuf,
    },

    /// Resolve the executable of an installed title
    Resolve {
        dir: PathBuf,
        /// Display name used to break ties between candidates
        #[arg(long)]
        name: Option<String>,
    },

    /// Print the CPU architecture of an executable
    Arch { path: PathBuf },
}

#[derive(Args)]
struct InstallArgs {
    /// Archive file, or a folder holding unpacked content
    archive: PathBuf,

    /// Platform entry the title belongs to
    #[arg(long, default_value = "Windows")]
    platform: String,

    /// Use this extracted tree instead of extracting the archive
    #[arg(long)]
    extracted: Option<PathBuf>,

    /// Install root, bypassing the configured destination
    #[arg(long)]
    install_dir: Option<PathBuf>,

    /// Library root the finished install is moved to
    #[arg(long)]
    final_dir: Option<PathBuf>,

    /// Display name (defaults to the archive name without tags)
    #[arg(long)]
    name: Option<String>,

    /// Run recognized installers silently regardless of the platform policy
    #[arg(long)]
    silent: bool,

    /// Answer every confirmation with yes
    #[arg(short, long)]
    yes: bool,

    /// 7-Zip executable
    #[arg(long, default_value = "7z")]
    seven_zip: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = load_settings(cli.settings.as_deref())?;
    let mut config = InstallerConfig::default().with_settings(&settings);
    if let Some(temp) = std::env::var_os("INSTALLER_TEMP_DIR") {
        config = config.with_temp_root(PathBuf::from(temp));
    }
    debug!(temp_root = %config.temp_root.display(), "configuration loaded");

    match cli.command {
        Commands::Install(args) => install(args, &settings, config).await,
        Commands::Classify {
            archive,
            extracted,
            seven_zip,
        } => {
            let verdict = match extracted {
                Some(tree) => installer::classify(&archive, Some(&tree)),
                None if archive.is_dir() => installer::classify(&archive, Some(&archive)),
                None => {
                    classify_with_fallback(&archive, &SevenZipExtractor::new(seven_zip), &config.temp_root).await
                }
            };
            println!("{}", verdict);
            Ok(())
        }
        Commands::Resolve { dir, name } => {
            match installer::resolve(&dir, name.as_deref(), &config.excluded_subfolders) {
                ExecutableResolution::Success { path, arguments } => {
                    println!("{}", path.display());
                    if !arguments.is_empty() {
                        println!("arguments: {}", arguments.join(" "));
                    }
                }
                ExecutableResolution::NeedsConfirmation { preferred, candidates } => {
                    for candidate in &candidates {
                        let marker = if *candidate == preferred { "*" } else { " " };
                        println!("{} {}", marker, candidate.display());
                    }
                }
                ExecutableResolution::Failed { reason } => bail!(reason),
            }
            Ok(())
        }
        Commands::Arch { path } => {
            if !path.is_file() {
                bail!("not a file: {}", path.display());
            }
            let detected = arch::detect(&path);
            println!(
                "{} (preference penalty on this host: {})",
                detected,
                arch::penalty(detected, is_64bit_host())
            );
            Ok(())
        }
    }
}

async fn install(args: InstallArgs, settings: &InstallerSettings, config: InstallerConfig) -> Result<()> {
    let platform = PlatformRef::new(args.platform.as_str());
    let mut policy = settings.policy_for(&platform);
    if args.silent {
        policy.installer_mode = InstallerMode::AutoSilent;
    }

    let extractor: Arc<dyn Extractor> = if args.archive.is_dir() {
        Arc::new(DirectoryExtractor)
    } else {
        Arc::new(SevenZipExtractor::new(args.seven_zip.clone()))
    };
    let dialog: Arc<dyn ConfirmDialog> = if args.yes {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(ConsolePrompt)
    };
    let destinations = ConfiguredDestinations::from_settings(settings).with_prompt(Arc::new(ConsolePrompt));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping before the next step");
            on_interrupt.cancel();
        }
    });

    let installer = Installer::new(config, extractor, Arc::new(destinations), dialog)
        .with_cancellation_token(cancel)
        .with_progress_callback(Arc::new(|progress: InstallProgress| {
            println!("[{}] {}: {}", progress.phase, progress.title, progress.message);
        }));

    let mut request = InstallRequest::new(&args.archive, platform, policy);
    if let Some(name) = args.name {
        request = request.with_display_name(name);
    }
    if let Some(extracted) = args.extracted {
        request = request.with_extracted_path(extracted);
    }
    if let Some(dir) = args.install_dir {
        request = request.with_install_dir(dir);
    }
    if let Some(dir) = args.final_dir {
        request = request.with_final_dir(dir);
    }

    let outcome = installer
        .install(&request)
        .await
        .with_context(|| format!("installing {}", args.archive.display()))?;

    match outcome {
        InstallOutcome::Success {
            executable,
            arguments,
            install_type,
            game_dir,
        } => {
            println!("Installed ({}) into {}", install_type, game_dir.display());
            println!("Executable: {}", executable.display());
            if !arguments.is_empty() {
                println!("Arguments: {}", arguments.join(" "));
            }
            Ok(())
        }
        InstallOutcome::Failed { reason } => bail!("install failed: {}", reason),
    }
}

fn load_settings(explicit: Option<&Path>) -> Result<InstallerSettings> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("INSTALLER_SETTINGS").map(PathBuf::from));

    match path {
        Some(path) => InstallerSettings::load(&path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => {
            debug!("no settings file given, using defaults");
            Ok(InstallerSettings::default())
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_target(false)
        .init();
}
