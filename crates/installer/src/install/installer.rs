//! Installer-type base content
//!
//! Locates the setup binary, decides between silent and interactive runs,
//! optionally folds recognized update and DLC installers into one elevated
//! batch, and confirms the result.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::config::PlatformInstallPolicy;
use crate::core::error::{FileOperation, InstallError, Result};
use crate::core::progress::InstallPhase;
use crate::core::{ContentKind, ContentRoot, files};
use crate::detect::classify::{all_recognized, find_installers, find_setup_binary, is_known_installer_signature, payload_root};
use crate::detect::resolve::{ExecutableResolution, resolve};
use crate::install::batch::InstallerBatch;
use crate::install::confirm::{CompletionEvidence, confirm_install};
use crate::install::lib::{BaseInstall, Installer, Run, blocking};
use crate::integrations::launcher::LaunchMode;

/// Silent arguments plus the target directory and log file for one run
pub fn installer_arguments(policy: &PlatformInstallPolicy, target: &Path, log_file: &Path) -> Vec<String> {
    let mut arguments = policy.silent_args();
    arguments.push(format!("/DIR=\"{}\"", target.display()));
    arguments.push(format!("/LOG=\"{}\"", log_file.display()));
    arguments
}

/// A previous install of the title under `library_root`, if one is usable
///
/// The folder must exist and contain something the executable resolver can
/// work with.
pub async fn existing_install(library_root: &Path, folder_name: &str, excluded: &[String]) -> Option<PathBuf> {
    let candidate = library_root.join(folder_name);
    if !fs::metadata(&candidate).await.ok()?.is_dir() {
        return None;
    }

    let probe = candidate.clone();
    let excluded = excluded.to_vec();
    let resolution = blocking(move || resolve(&probe, None, &excluded)).await.ok()?;
    match resolution {
        ExecutableResolution::Failed { .. } => None,
        _ => Some(candidate),
    }
}

impl Installer {
    pub(super) async fn install_with_installer(
        &self,
        run: &Run<'_>,
        extracted: &Path,
        content: &[ContentRoot],
    ) -> Result<BaseInstall> {
        let payload = payload_root(extracted);
        let search_root = payload.clone();
        let setup = blocking(move || find_setup_binary(&search_root))
            .await?
            .ok_or(InstallError::SetupNotFound(payload))?;

        if self.config.skip_when_installed {
            let library_root = run.request.final_dir.as_deref().unwrap_or(run.install_dir.as_path());
            if let Some(existing) = existing_install(library_root, &run.title, &self.config.excluded_subfolders).await {
                info!(
                    title = %run.title,
                    path = %existing.display(),
                    "title already installed, skipping installer"
                );
                return Ok(BaseInstall {
                    game_dir: existing,
                    batched: Vec::new(),
                });
            }
        }

        let policy = &run.request.policy;
        let probe = setup.clone();
        let recognized = blocking(move || is_known_installer_signature(&probe)).await?;
        let silent = policy.is_auto_silent() && recognized;
        if policy.is_auto_silent() && !recognized {
            warn!(setup = %setup.display(), "installer not recognized, running interactively");
        }

        let game_dir = run.install_dir.join(&run.title);
        let was_empty_before = files::is_dir_empty(&game_dir).await;
        let log_file = logs_dir(&run.stage).await?.join("install.log");
        let arguments = installer_arguments(policy, &game_dir, &log_file);

        let queued = if silent {
            self.batchable_content(content).await?
        } else {
            Vec::new()
        };

        self.check_cancelled("before launching the installer")?;
        let exit_code = if !queued.is_empty() {
            let mut installers = vec![setup.clone()];
            installers.extend(queued.iter().flat_map(|(_, list)| list.iter().cloned()));
            self.run_batch(installers, arguments, &run.stage.join("batch").join("base")).await?
        } else if silent {
            info!(setup = %setup.display(), "running installer silently");
            self.launcher.launch(&setup, &arguments, LaunchMode::Silent).await?
        } else {
            info!(setup = %setup.display(), target = %game_dir.display(), "running installer interactively");
            self.launcher.launch(&setup, &[], LaunchMode::Interactive).await?
        };

        self.report(
            InstallPhase::Confirming,
            &run.title,
            format!("Installer exited with code {}", exit_code),
        );
        let evidence = CompletionEvidence {
            target: game_dir.clone(),
            log_file: silent.then_some(log_file),
            was_empty_before,
            exit_code,
        };
        let signal = confirm_install(
            &evidence,
            &self.config.success_phrase,
            self.registry.clone(),
            self.dialog.as_ref(),
        )
        .await;
        if !signal.is_confirmed() {
            return Err(InstallError::InstallNotConfirmed(game_dir));
        }
        info!(title = %run.title, signal = ?signal, "installer run confirmed");

        Ok(BaseInstall {
            game_dir,
            batched: queued.into_iter().map(|(kind, _)| kind).collect(),
        })
    }

    /// Update and DLC installers that can join the base installer's batch
    async fn batchable_content(&self, content: &[ContentRoot]) -> Result<Vec<(ContentKind, Vec<PathBuf>)>> {
        let mut queued = Vec::new();
        for root in content.iter().filter(|r| r.kind.is_installable()) {
            let folder = root.path.clone();
            let installers = blocking(move || {
                let installers = find_installers(&folder);
                all_recognized(&installers).then_some(installers)
            })
            .await?;
            if let Some(installers) = installers {
                queued.push((root.kind, installers));
            }
        }
        Ok(queued)
    }

    /// Write and run a batch script, returning its exit code
    pub(super) async fn run_batch(&self, installers: Vec<PathBuf>, arguments: Vec<String>, batch_dir: &Path) -> Result<i32> {
        let count = installers.len();
        let batch = InstallerBatch::new(installers, arguments, batch_dir.join("execution.log"));
        let script = batch.write_script(batch_dir).await?;

        info!(installers = count, script = %script.display(), "running installer batch under one elevation");
        let exit_code = self.launcher.run_elevated_script(&script).await?;
        if exit_code != 0 {
            warn!(exit_code, script = %script.display(), "installer batch reported a failure");
        }
        Ok(exit_code)
    }
}

pub(super) async fn logs_dir(stage: &Path) -> Result<PathBuf> {
    let dir = stage.join("logs");
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| InstallError::fs(&dir, FileOperation::CreateDir, e))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstallerMode;

    #[test]
    fn arguments_carry_target_and_log() {
        let policy = PlatformInstallPolicy {
            installer_mode: InstallerMode::AutoSilent,
            ..Default::default()
        };
        let args = installer_arguments(&policy, Path::new("/games/Game"), Path::new("/stage/logs/install.log"));
        assert_eq!(
            args,
            vec![
                "/SILENT",
                "/SUPPRESSMSGBOXES",
                "/NORESTART",
                "/DIR=\"/games/Game\"",
                "/LOG=\"/stage/logs/install.log\"",
            ]
        );
    }

    #[tokio::test]
    async fn existing_install_needs_an_executable() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(existing_install(dir.path(), "Game", &[]).await, None);

        let game = dir.path().join("Game");
        fs::create_dir_all(&game).await.unwrap();
        fs::write(game.join("readme.txt"), b"hi").await.unwrap();
        assert_eq!(existing_install(dir.path(), "Game", &[]).await, None);

        fs::write(game.join("game.exe"), b"MZ").await.unwrap();
        assert_eq!(existing_install(dir.path(), "Game", &[]).await, Some(game));
    }
}
