//! Install orchestrator
//!
//! Drives one title from archive to launchable executable:
//!
//! Staging -> ClassifyingBase -> InstallingBase -> Confirming ->
//! InstallingOptionalContent -> Cleanup, or FailedRetained on any failure.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use installer::{
//!     AutoConfirm, ConfiguredDestinations, InstallRequest, Installer, InstallerConfig,
//!     PlatformInstallPolicy, PlatformRef, SevenZipExtractor,
//! };
//!
//! # async fn example() -> installer::Result<()> {
//! let destinations = ConfiguredDestinations::new().with_root("Windows", "D:/Games");
//! let installer = Installer::new(
//!     InstallerConfig::default(),
//!     Arc::new(SevenZipExtractor::default()),
//!     Arc::new(destinations),
//!     Arc::new(AutoConfirm(true)),
//! );
//!
//! let request = InstallRequest::new(
//!     "D:/Archives/Some Game (installer).7z",
//!     PlatformRef::new("Windows"),
//!     PlatformInstallPolicy::default(),
//! );
//! let outcome = installer.install(&request).await?;
//! println!("{:?}", outcome.executable());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::InstallerConfig;
use crate::core::error::{FileOperation, InstallError, Result};
use crate::core::progress::{InstallPhase, InstallProgress, ProgressCallback};
use crate::core::{ContentRoot, InstallOutcome, InstallRequest, InstallType, discover_content_roots, files};
use crate::detect::classify::{classify, payload_root};
use crate::detect::resolve::{ExecutableResolution, resolve};
use crate::install::portable::normalize_portable;
use crate::integrations::dialog::ConfirmDialog;
use crate::integrations::destination::DestinationResolver;
use crate::integrations::extract::{ExtractBehavior, Extractor};
use crate::integrations::launcher::{InstallerLauncher, ShellLauncher};
use crate::integrations::registry::{InstalledApps, system_registry};

/// Per-run state shared by the pipeline phases
pub(super) struct Run<'a> {
    pub(super) request: &'a InstallRequest,
    /// Sanitized folder name of the title
    pub(super) title: String,
    pub(super) install_dir: PathBuf,
    /// Private staging directory, removed only on success
    pub(super) stage: PathBuf,
}

/// Base content as left by the installer or portable normalization
pub(super) struct BaseInstall {
    pub(super) game_dir: PathBuf,
    /// Update and DLC folders whose installers already ran with the base
    pub(super) batched: Vec<crate::core::ContentKind>,
}

/// Main orchestrator
pub struct Installer {
    pub(super) config: InstallerConfig,
    pub(super) extractor: Arc<dyn Extractor>,
    pub(super) destinations: Arc<dyn DestinationResolver>,
    pub(super) dialog: Arc<dyn ConfirmDialog>,
    pub(super) launcher: Arc<dyn InstallerLauncher>,
    pub(super) registry: Arc<dyn InstalledApps>,
    progress_callback: Option<ProgressCallback>,
    cancellation_token: CancellationToken,
}

impl Installer {
    /// Create an orchestrator using the shell launcher and the system uninstall registry
    pub fn new(
        config: InstallerConfig,
        extractor: Arc<dyn Extractor>,
        destinations: Arc<dyn DestinationResolver>,
        dialog: Arc<dyn ConfirmDialog>,
    ) -> Self {
        Self {
            config,
            extractor,
            destinations,
            dialog,
            launcher: Arc::new(ShellLauncher),
            registry: Arc::from(system_registry()),
            progress_callback: None,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn InstallerLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn InstalledApps>) -> Self {
        self.registry = registry;
        self
    }

    /// Set a progress callback for phase updates
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Set a cancellation token
    ///
    /// Cancellation is honored before extraction and before each process
    /// launch. Running installers are always awaited.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Install one title
    ///
    /// Expected failures come back as [`InstallOutcome::Failed`]; only
    /// unexpected errors are returned as `Err`. The staging directory is
    /// deleted on success and kept for inspection otherwise.
    pub async fn install(&self, request: &InstallRequest) -> Result<InstallOutcome> {
        let title = request.folder_name();
        info!(
            archive = %request.archive_path.display(),
            platform = %request.platform,
            title = %title,
            "starting install"
        );

        let install_dir = match self.preflight(request).await {
            Ok(dir) => dir,
            Err(e) if e.is_reported() => {
                warn!(title = %title, error = %e, "install rejected before staging");
                self.report(InstallPhase::FailedRetained, &title, e.to_string());
                return Ok(InstallOutcome::Failed { reason: e.to_string() });
            }
            Err(e) => return Err(e),
        };

        let stage = self.create_stage().await?;
        let run = Run {
            request,
            title,
            install_dir,
            stage,
        };

        match self.run_pipeline(&run).await {
            Ok(outcome) => {
                self.report(InstallPhase::Cleanup, &run.title, "Removing staging area");
                files::remove_tree_best_effort(&run.stage).await;
                info!(title = %run.title, executable = ?outcome.executable(), "install finished");
                Ok(outcome)
            }
            Err(e) => {
                self.report(
                    InstallPhase::FailedRetained,
                    &run.title,
                    format!("{} (staging kept at {})", e, run.stage.display()),
                );
                if e.is_reported() {
                    warn!(
                        title = %run.title,
                        stage = %run.stage.display(),
                        category = e.category(),
                        error = %e,
                        "install failed, staging area retained"
                    );
                    Ok(InstallOutcome::Failed { reason: e.to_string() })
                } else {
                    error!(
                        title = %run.title,
                        stage = %run.stage.display(),
                        report = %e.detailed_report(),
                        "unexpected install error, staging area retained"
                    );
                    Err(e)
                }
            }
        }
    }

    async fn run_pipeline(&self, run: &Run<'_>) -> Result<InstallOutcome> {
        self.report(InstallPhase::Staging, &run.title, "Preparing content");
        let extracted = self.stage_content(run).await?;

        self.report(InstallPhase::ClassifyingBase, &run.title, "Classifying archive");
        let install_type = self.classify_staged(run, &extracted).await?;
        let content = self.collect_content_roots(run, &extracted).await?;
        debug!(
            title = %run.title,
            install_type = %install_type,
            content = ?content.iter().map(|c| c.kind).collect::<Vec<_>>(),
            "classified staged content"
        );

        self.report(
            InstallPhase::InstallingBase,
            &run.title,
            format!("Installing {} content", install_type),
        );
        let base = match install_type {
            InstallType::Installer => self.install_with_installer(run, &extracted, &content).await?,
            _ => BaseInstall {
                game_dir: normalize_portable(&extracted, &run.install_dir, &run.title).await?,
                batched: Vec::new(),
            },
        };

        let game_dir = self.move_to_final(run, base.game_dir).await?;
        let (executable, arguments) = self.resolve_executable(run, &game_dir).await?;

        if !content.is_empty() {
            self.report(
                InstallPhase::InstallingOptionalContent,
                &run.title,
                format!("Installing {} optional content folder(s)", content.len()),
            );
            let report = self.install_optional_content(run, &game_dir, &content, &base.batched).await;
            info!(
                title = %run.title,
                installed = ?report.installed,
                skipped = report.skipped.len(),
                "optional content processed"
            );
        }

        Ok(InstallOutcome::Success {
            executable,
            arguments,
            install_type,
            game_dir,
        })
    }

    /// Input checks that must pass before anything touches the disk
    async fn preflight(&self, request: &InstallRequest) -> Result<PathBuf> {
        match &request.extracted_path {
            Some(extracted) => {
                if fs::metadata(extracted).await.is_err() {
                    return Err(InstallError::ContentNotFound(extracted.clone()));
                }
            }
            None => {
                if fs::metadata(&request.archive_path).await.is_err() {
                    return Err(InstallError::ArchiveNotFound(request.archive_path.clone()));
                }
            }
        }

        if let Some(dir) = &request.install_dir {
            return Ok(dir.clone());
        }

        let resolution = self
            .destinations
            .resolve(&request.platform, request.policy.installer_mode)
            .await;
        match resolution.directory {
            Some(dir) if resolution.success => Ok(dir),
            _ => Err(InstallError::DestinationUnresolved {
                platform: request.platform.name().to_string(),
                message: resolution.message,
            }),
        }
    }

    async fn create_stage(&self) -> Result<PathBuf> {
        let root = &self.config.temp_root;
        fs::create_dir_all(root)
            .await
            .map_err(|e| InstallError::fs(root, FileOperation::CreateDir, e))?;

        let stage = tempfile::Builder::new()
            .prefix("stage-")
            .tempdir_in(root)
            .map_err(|e| InstallError::fs(root, FileOperation::CreateDir, e))?;
        Ok(stage.keep())
    }

    /// Extract the archive, or adopt a pre-extracted tree, inside the staging area
    async fn stage_content(&self, run: &Run<'_>) -> Result<PathBuf> {
        let destination = run.stage.join("extracted");

        match &run.request.extracted_path {
            Some(extracted) => {
                let temp_root = files::normalize_path(&self.config.temp_root);
                if files::is_within(&files::normalize_path(extracted), &temp_root) {
                    debug!(path = %extracted.display(), "pre-extracted tree already staged");
                    Ok(extracted.clone())
                } else {
                    info!(
                        source = %extracted.display(),
                        destination = %destination.display(),
                        "moving pre-extracted tree into staging"
                    );
                    files::relocate_tree(extracted, &destination).await
                }
            }
            None => {
                self.check_cancelled("before extraction")?;
                let archive = &run.request.archive_path;
                self.extractor
                    .extract(archive, &destination, ExtractBehavior::Direct)
                    .await
                    .map_err(|e| match e {
                        reported if reported.is_reported() => reported,
                        other => InstallError::Extraction {
                            archive: archive.clone(),
                            reason: other.to_string(),
                        },
                    })
            }
        }
    }

    async fn classify_staged(&self, run: &Run<'_>, extracted: &Path) -> Result<InstallType> {
        let archive = run.request.archive_path.clone();
        let tree = extracted.to_path_buf();
        let verdict = blocking(move || classify(&archive, Some(&tree))).await?;
        Ok(match verdict {
            InstallType::Unknown => InstallType::Portable,
            known => known,
        })
    }

    /// Find reserved content folders and lift nested ones out of the payload
    ///
    /// Folders inside a single wrapper folder would otherwise travel with the
    /// game folder when it is moved into place.
    async fn collect_content_roots(&self, run: &Run<'_>, extracted: &Path) -> Result<Vec<ContentRoot>> {
        let mut roots = discover_content_roots(extracted);
        let payload = payload_root(extracted);
        if payload == extracted {
            return Ok(roots);
        }

        for nested in discover_content_roots(&payload) {
            if roots.iter().any(|r| r.kind == nested.kind) {
                continue;
            }
            let hoisted = run.stage.join("content").join(nested.kind.folder_name());
            let path = files::relocate_tree(&nested.path, &hoisted).await?;
            debug!(kind = %nested.kind, path = %path.display(), "lifted content folder out of payload");
            roots.push(ContentRoot { kind: nested.kind, path });
        }
        roots.sort_by_key(|r| r.kind);
        Ok(roots)
    }

    /// Relocate a staged install to its final library folder
    async fn move_to_final(&self, run: &Run<'_>, game_dir: PathBuf) -> Result<PathBuf> {
        let Some(final_root) = &run.request.final_dir else {
            return Ok(game_dir);
        };
        let final_dir = final_root.join(&run.title);
        if final_dir != game_dir {
            info!(from = %game_dir.display(), to = %final_dir.display(), "moving install to final directory");
        }
        files::relocate_tree(&game_dir, &final_dir).await
    }

    async fn resolve_executable(&self, run: &Run<'_>, game_dir: &Path) -> Result<(PathBuf, Vec<String>)> {
        let root = game_dir.to_path_buf();
        let display_name = run.request.display_name.clone();
        let excluded = self.config.excluded_subfolders.clone();
        let resolution = blocking(move || resolve(&root, Some(&display_name), &excluded)).await?;

        match resolution {
            ExecutableResolution::Success { path, arguments } => {
                info!(executable = %path.display(), "resolved executable");
                Ok((path, arguments))
            }
            ExecutableResolution::NeedsConfirmation { preferred, candidates } => {
                self.report(
                    InstallPhase::Confirming,
                    &run.title,
                    format!("{} executables found", candidates.len()),
                );
                match self.dialog.choose_executable(&candidates, &preferred).await {
                    Some(path) => {
                        info!(executable = %path.display(), "executable confirmed by operator");
                        Ok((path, Vec::new()))
                    }
                    None => Err(InstallError::ExecutableNotConfirmed(game_dir.to_path_buf())),
                }
            }
            ExecutableResolution::Failed { reason } => Err(InstallError::ExecutableNotFound {
                root: game_dir.to_path_buf(),
                reason,
            }),
        }
    }

    pub(super) fn report(&self, phase: InstallPhase, title: &str, message: impl Into<String>) {
        let message = message.into();
        info!(phase = %phase, title, "{}", message);
        if let Some(callback) = &self.progress_callback {
            callback(InstallProgress {
                phase,
                title: title.to_string(),
                message,
            });
        }
    }

    pub(super) fn check_cancelled(&self, point: &str) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            Err(InstallError::Cancelled {
                reason: format!("cancelled {}", point),
            })
        } else {
            Ok(())
        }
    }
}

/// Run blocking disk scans off the async workers
pub(super) async fn blocking<F, T>(work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work).await?)
}
