//! Installer Library
//!
//! Install orchestration for PC game archives. Given an archive (or an
//! already extracted tree) and a platform policy, the library stages the
//! content, decides whether it ships an installer or is portable, runs the
//! installer silently or interactively, confirms the result, places optional
//! content and resolves the executable to launch.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use installer::{
//!     AutoConfirm, ConfiguredDestinations, InstallOutcome, InstallProgress, InstallRequest,
//!     Installer, InstallerConfig, InstallerSettings, SevenZipExtractor,
//! };
//!
//! # async fn example() -> installer::Result<()> {
//! let settings = InstallerSettings::load(std::path::Path::new("installer-settings.json"))?;
//! let config = InstallerConfig::default().with_settings(&settings);
//!
//! let installer = Installer::new(
//!     config,
//!     Arc::new(SevenZipExtractor::default()),
//!     Arc::new(ConfiguredDestinations::from_settings(&settings)),
//!     Arc::new(AutoConfirm(false)),
//! )
//! .with_progress_callback(Arc::new(|progress: InstallProgress| {
//!     println!("[{}] {}: {}", progress.phase, progress.title, progress.message);
//! }));
//!
//! let platform = installer::PlatformRef::new("Windows");
//! let request = InstallRequest::new(
//!     "D:/Archives/Some Game (installer).7z",
//!     platform.clone(),
//!     settings.policy_for(&platform),
//! );
//!
//! match installer.install(&request).await? {
//!     InstallOutcome::Success { executable, .. } => println!("Launch {}", executable.display()),
//!     InstallOutcome::Failed { reason } => println!("Install failed: {}", reason),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Classification**: `(installer)` / `(portable)` name tags, `setup.exe` detection and Inno Setup signatures
//! - **Silent installs**: recognized installers get silent flags, a target directory and a log file
//! - **Single elevation**: base, update and DLC installers chained in one elevated script
//! - **Completion checks**: log phrase, uninstall registry, new content, then the operator
//! - **Optional content**: updates, DLC, soundtracks, bonus material and prerequisites
//! - **Executable resolution**: manifest override, architecture-aware heuristics

pub mod config;
pub mod core;
pub mod detect;
pub mod install;
pub mod integrations;

// Re-export commonly used types for convenience
pub use config::{
    ContentPlacement, InstallerConfig, InstallerMode, InstallerSettings, PlatformEntry, PlatformInstallPolicy,
};
pub use crate::core::{
    ContentKind, ContentRoot, InstallError, InstallOutcome, InstallPhase, InstallProgress, InstallRequest,
    InstallType, PlatformRef, ProgressCallback, Result,
};
pub use detect::{ExecutableArch, ExecutableResolution, classify, resolve};
pub use install::Installer;
pub use integrations::{
    AutoConfirm, ConfiguredDestinations, ConfirmDialog, DestinationResolution, DestinationResolver,
    DirectoryExtractor, ExtractBehavior, Extractor, FolderPrompt, InstalledApps, InstallerLauncher, LaunchMode,
    NoRegistry, SevenZipExtractor, ShellLauncher,
};
