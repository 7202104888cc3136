//! Operator confirmation contract
//!
//! Confirmation dialogs are the only interactive recovery surface. The
//! orchestrator awaits them; implementations are responsible for reaching
//! whatever thread owns the user interface.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Modal yes/no dialogs shown to the operator
#[async_trait]
pub trait ConfirmDialog: Send + Sync {
    /// Ask a yes/no question
    async fn confirm(&self, title: &str, message: &str, detail: &str) -> bool;

    /// Pick the executable to launch out of several candidates
    ///
    /// The default asks to accept the preferred pick and returns `None` when
    /// the operator declines.
    async fn choose_executable(&self, candidates: &[PathBuf], preferred: &Path) -> Option<PathBuf> {
        let listing = candidates
            .iter()
            .map(|c| format!("  {}", c.display()))
            .collect::<Vec<_>>()
            .join("\n");
        let message = format!(
            "Several executables were found:\n{}\n\nUse {}?",
            listing,
            preferred.display()
        );

        if self.confirm("Confirm executable", &message, &preferred.display().to_string()).await {
            Some(preferred.to_path_buf())
        } else {
            None
        }
    }
}

/// Dialog that answers every question the same way
///
/// For unattended runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl ConfirmDialog for AutoConfirm {
    async fn confirm(&self, _title: &str, _message: &str, _detail: &str) -> bool {
        self.0
    }
}
