//! Optional content: updates, DLC, soundtracks, bonus material and prerequisites
//!
//! Every folder is handled on its own and failures never fail the title.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::{ContentPlacement, PlatformInstallPolicy};
use crate::core::error::Result;
use crate::core::{ContentKind, ContentRoot, files};
use crate::detect::classify::{all_recognized, find_installers, is_known_installer_signature};
use crate::install::installer::{installer_arguments, logs_dir};
use crate::install::lib::{Installer, Run, blocking};
use crate::integrations::launcher::LaunchMode;

/// Folder names used when content is placed inside the game folder
const OST_SUBFOLDER: &str = "OST";
const BONUS_SUBFOLDER: &str = "Bonus";

/// What happened to each optional content folder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalContentReport {
    pub installed: Vec<ContentKind>,
    pub skipped: Vec<(ContentKind, String)>,
}

enum ContentStatus {
    Installed,
    Skipped(String),
}

/// Whether the platform policy asks for this kind of content
pub fn is_enabled(kind: ContentKind, policy: &PlatformInstallPolicy) -> bool {
    match kind {
        ContentKind::Update | ContentKind::Dlc => true,
        ContentKind::Ost => policy.install_ost,
        ContentKind::Bonus => policy.install_bonus,
        ContentKind::PreReqs => policy.install_prereqs,
    }
}

/// Where a content folder is copied to, if anywhere
///
/// Centralized soundtrack and bonus content goes to `<path>/<title>`;
/// game-folder placement uses a fixed subfolder of the game directory.
/// Prerequisites go flat into their configured path.
pub fn content_destination(
    kind: ContentKind,
    policy: &PlatformInstallPolicy,
    game_dir: &Path,
    title: &str,
) -> Option<PathBuf> {
    match kind {
        ContentKind::Update | ContentKind::Dlc => Some(game_dir.to_path_buf()),
        ContentKind::Ost => placed(policy.ost_placement, policy.ost_path.as_deref(), game_dir, OST_SUBFOLDER, title),
        ContentKind::Bonus => placed(
            policy.bonus_placement,
            policy.bonus_path.as_deref(),
            game_dir,
            BONUS_SUBFOLDER,
            title,
        ),
        ContentKind::PreReqs => policy.prereqs_path.clone(),
    }
}

fn placed(
    placement: ContentPlacement,
    central: Option<&Path>,
    game_dir: &Path,
    subfolder: &str,
    title: &str,
) -> Option<PathBuf> {
    match placement {
        ContentPlacement::Centralized => central.map(|path| path.join(title)),
        ContentPlacement::GameFolder => Some(game_dir.join(subfolder)),
    }
}

impl Installer {
    pub(super) async fn install_optional_content(
        &self,
        run: &Run<'_>,
        game_dir: &Path,
        content: &[ContentRoot],
        batched: &[ContentKind],
    ) -> OptionalContentReport {
        let mut report = OptionalContentReport::default();
        let policy = &run.request.policy;

        for root in content {
            if batched.contains(&root.kind) {
                debug!(kind = %root.kind, "installed together with the base installer");
                report.installed.push(root.kind);
                continue;
            }
            if !is_enabled(root.kind, policy) {
                debug!(kind = %root.kind, "disabled by platform policy");
                report.skipped.push((root.kind, "disabled by platform policy".to_string()));
                continue;
            }

            let result = match root.kind {
                ContentKind::Update | ContentKind::Dlc => self.install_update_content(run, game_dir, root).await,
                ContentKind::Ost | ContentKind::Bonus => copy_content(run, game_dir, root).await,
                ContentKind::PreReqs => stage_prereqs(policy, root).await,
            };

            match result {
                Ok(ContentStatus::Installed) => report.installed.push(root.kind),
                Ok(ContentStatus::Skipped(reason)) => {
                    warn!(kind = %root.kind, reason = %reason, "optional content skipped");
                    report.skipped.push((root.kind, reason));
                }
                Err(e) => {
                    warn!(kind = %root.kind, error = %e, "optional content failed");
                    report.skipped.push((root.kind, e.to_string()));
                }
            }
        }

        report
    }

    /// Run update or DLC installers, or merge a plain folder into the game
    async fn install_update_content(&self, run: &Run<'_>, game_dir: &Path, root: &ContentRoot) -> Result<ContentStatus> {
        let folder = root.path.clone();
        let installers = blocking(move || find_installers(&folder)).await?;

        if installers.is_empty() {
            let copied = files::copy_tree(&root.path, game_dir).await?;
            info!(
                kind = %root.kind,
                files = copied.files_copied,
                failures = copied.failures,
                "merged content folder into game directory"
            );
            return Ok(ContentStatus::Installed);
        }

        let policy = &run.request.policy;
        let logs = logs_dir(&run.stage).await?;
        let label = root.kind.folder_name();

        if policy.is_auto_silent() && installers.len() > 1 {
            let probe = installers.clone();
            if blocking(move || all_recognized(&probe)).await? {
                self.check_cancelled("before launching content installers")?;
                let arguments = installer_arguments(policy, game_dir, &logs.join(format!("{}.log", label)));
                let exit_code = self
                    .run_batch(installers, arguments, &run.stage.join("batch").join(label))
                    .await?;
                if exit_code != 0 {
                    return Ok(ContentStatus::Skipped(format!(
                        "installer batch finished with exit code {}",
                        exit_code
                    )));
                }
                return Ok(ContentStatus::Installed);
            }
        }

        for (index, installer) in installers.iter().enumerate() {
            self.check_cancelled("before launching content installers")?;

            let probe = installer.clone();
            let silent = policy.is_auto_silent() && blocking(move || is_known_installer_signature(&probe)).await?;
            let result = if silent {
                let log_file = logs.join(format!("{}-{}.log", label, index + 1));
                self.launcher
                    .launch(installer, &installer_arguments(policy, game_dir, &log_file), LaunchMode::Silent)
                    .await
            } else {
                self.launcher.launch(installer, &[], LaunchMode::Interactive).await
            };

            match result {
                Ok(0) => debug!(installer = %installer.display(), "content installer finished"),
                Ok(code) => warn!(installer = %installer.display(), exit_code = code, "content installer exited non-zero"),
                Err(e) => warn!(installer = %installer.display(), error = %e, "content installer could not be started"),
            }
        }

        Ok(ContentStatus::Installed)
    }
}

/// Copy soundtrack or bonus content; the staged source is left alone
async fn copy_content(run: &Run<'_>, game_dir: &Path, root: &ContentRoot) -> Result<ContentStatus> {
    let Some(destination) = content_destination(root.kind, &run.request.policy, game_dir, &run.title) else {
        return Ok(ContentStatus::Skipped(format!(
            "no centralized {} path configured",
            root.kind
        )));
    };

    let copied = files::copy_tree(&root.path, &destination).await?;
    info!(
        kind = %root.kind,
        destination = %destination.display(),
        files = copied.files_copied,
        failures = copied.failures,
        "copied optional content"
    );
    Ok(ContentStatus::Installed)
}

/// Copy prerequisites flat into their shared folder and drop the staged copy
async fn stage_prereqs(policy: &PlatformInstallPolicy, root: &ContentRoot) -> Result<ContentStatus> {
    let Some(destination) = policy.prereqs_path.as_deref() else {
        return Ok(ContentStatus::Skipped("no prerequisites path configured".to_string()));
    };

    let copied = files::copy_tree(&root.path, destination).await?;
    info!(
        destination = %destination.display(),
        files = copied.files_copied,
        failures = copied.failures,
        "copied prerequisites"
    );

    if copied.failures == 0 {
        if let Err(e) = fs::remove_dir_all(&root.path).await {
            warn!(path = %root.path.display(), error = %e, "failed to remove staged prerequisites");
        }
    } else {
        warn!(path = %root.path.display(), "prerequisites copied with failures, source kept");
    }
    Ok(ContentStatus::Installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PlatformInstallPolicy {
        PlatformInstallPolicy {
            install_ost: true,
            ost_placement: ContentPlacement::Centralized,
            ost_path: Some(PathBuf::from("/music")),
            install_bonus: true,
            bonus_placement: ContentPlacement::GameFolder,
            prereqs_path: Some(PathBuf::from("/prereqs")),
            ..Default::default()
        }
    }

    #[test]
    fn destinations_follow_placement() {
        let policy = policy();
        let game = Path::new("/games/Game");

        assert_eq!(
            content_destination(ContentKind::Ost, &policy, game, "Game"),
            Some(PathBuf::from("/music/Game"))
        );
        assert_eq!(
            content_destination(ContentKind::Bonus, &policy, game, "Game"),
            Some(PathBuf::from("/games/Game/Bonus"))
        );
        assert_eq!(
            content_destination(ContentKind::PreReqs, &policy, game, "Game"),
            Some(PathBuf::from("/prereqs"))
        );
        assert_eq!(
            content_destination(ContentKind::Dlc, &policy, game, "Game"),
            Some(game.to_path_buf())
        );
    }

    #[test]
    fn centralized_without_path_has_no_destination() {
        let policy = PlatformInstallPolicy {
            ost_placement: ContentPlacement::Centralized,
            ost_path: None,
            ..Default::default()
        };
        assert_eq!(
            content_destination(ContentKind::Ost, &policy, Path::new("/games/Game"), "Game"),
            None
        );
    }

    #[test]
    fn only_updates_and_dlc_are_always_enabled() {
        let policy = PlatformInstallPolicy::default();
        assert!(is_enabled(ContentKind::Update, &policy));
        assert!(is_enabled(ContentKind::Dlc, &policy));
        assert!(!is_enabled(ContentKind::Ost, &policy));
        assert!(!is_enabled(ContentKind::Bonus, &policy));
        assert!(!is_enabled(ContentKind::PreReqs, &policy));
    }

    #[tokio::test]
    async fn prereqs_are_copied_flat_and_source_removed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Pre-Reqs");
        fs::create_dir_all(source.join("DirectX")).await.unwrap();
        fs::write(source.join("vcredist_x64.exe"), b"MZ").await.unwrap();
        fs::write(source.join("DirectX").join("dxsetup.exe"), b"MZ").await.unwrap();

        let target = dir.path().join("shared-prereqs");
        let policy = PlatformInstallPolicy {
            install_prereqs: true,
            prereqs_path: Some(target.clone()),
            ..Default::default()
        };
        let root = ContentRoot {
            kind: ContentKind::PreReqs,
            path: source.clone(),
        };

        let status = stage_prereqs(&policy, &root).await.unwrap();
        assert!(matches!(status, ContentStatus::Installed));
        assert!(target.join("vcredist_x64.exe").is_file());
        assert!(target.join("DirectX").join("dxsetup.exe").is_file());
        assert!(!source.exists());
    }
}
