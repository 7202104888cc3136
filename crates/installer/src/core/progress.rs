//! Progress reporting for install runs

use std::sync::Arc;

/// Progress callback type for installation updates
pub type ProgressCallback = Arc<dyn Fn(InstallProgress) + Send + Sync>;

/// Installation progress information
#[derive(Debug, Clone)]
pub struct InstallProgress {
    pub phase: InstallPhase,
    pub title: String,
    pub message: String,
}

/// Installation phases
///
/// Mirrors the orchestrator's state machine. A run ends in either
/// `Cleanup` or `FailedRetained`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    Staging,
    ClassifyingBase,
    InstallingBase,
    Confirming,
    InstallingOptionalContent,
    Cleanup,
    FailedRetained,
}

impl std::fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            InstallPhase::Staging => "staging",
            InstallPhase::ClassifyingBase => "classifying",
            InstallPhase::InstallingBase => "installing base content",
            InstallPhase::Confirming => "confirming",
            InstallPhase::InstallingOptionalContent => "installing optional content",
            InstallPhase::Cleanup => "cleaning up",
            InstallPhase::FailedRetained => "failed",
        };
        write!(f, "{}", label)
    }
}
