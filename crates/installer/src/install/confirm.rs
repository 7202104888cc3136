//! Installer completion confirmation
//!
//! Installers give no reliable completion signal, so several are tried in
//! order: the installer's own log, the uninstall registry, new content in a
//! previously empty target, and finally the operator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::files;
use crate::integrations::dialog::ConfirmDialog;
use crate::integrations::registry::InstalledApps;

/// Which check accepted (or rejected) the install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationSignal {
    LogPhrase,
    Registry,
    NewContent,
    Operator,
    Declined,
}

impl ConfirmationSignal {
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, ConfirmationSignal::Declined)
    }
}

/// Facts gathered around one installer run
#[derive(Debug, Clone)]
pub struct CompletionEvidence {
    pub target: PathBuf,
    pub log_file: Option<PathBuf>,
    pub was_empty_before: bool,
    pub exit_code: i32,
}

/// Decide whether an installer run succeeded
pub async fn confirm_install(
    evidence: &CompletionEvidence,
    success_phrase: &str,
    registry: Arc<dyn InstalledApps>,
    dialog: &dyn ConfirmDialog,
) -> ConfirmationSignal {
    let target = evidence.target.as_path();

    if let Some(log_file) = &evidence.log_file {
        if log_contains(log_file, success_phrase).await {
            note_exit_anomaly(evidence, "log file");
            info!(target = %target.display(), "installer log reports success");
            return ConfirmationSignal::LogPhrase;
        }
    }

    let registry_target = target.to_path_buf();
    let registered = tokio::task::spawn_blocking(move || registry.has_entry_under(&registry_target))
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "registry lookup task failed");
            false
        });
    if registered {
        note_exit_anomaly(evidence, "uninstall registry");
        info!(target = %target.display(), "uninstall registry lists the target");
        return ConfirmationSignal::Registry;
    }

    if evidence.exit_code == 0 && evidence.was_empty_before && !files::is_dir_empty(target).await {
        info!(target = %target.display(), "target directory received content");
        return ConfirmationSignal::NewContent;
    }

    debug!(target = %target.display(), exit_code = evidence.exit_code, "no automatic success signal, asking operator");
    let message = if evidence.exit_code == 0 {
        "The installer has exited. Did the installation complete successfully?".to_string()
    } else {
        format!(
            "The installer exited with code {}. Did the installation complete successfully?",
            evidence.exit_code
        )
    };
    if dialog
        .confirm("Confirm installation", &message, &target.display().to_string())
        .await
    {
        ConfirmationSignal::Operator
    } else {
        ConfirmationSignal::Declined
    }
}

async fn log_contains(log_file: &Path, phrase: &str) -> bool {
    match tokio::fs::read(log_file).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).contains(phrase),
        Err(e) => {
            debug!(log = %log_file.display(), error = %e, "installer log not readable");
            false
        }
    }
}

fn note_exit_anomaly(evidence: &CompletionEvidence, signal: &str) {
    if evidence.exit_code != 0 {
        warn!(
            target = %evidence.target.display(),
            exit_code = evidence.exit_code,
            signal,
            "installer exited non-zero but reported success"
        );
    }
}
