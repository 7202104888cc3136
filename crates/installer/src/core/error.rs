//! Error types for the install pipeline with context and reporting information

use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while staging, installing or resolving a title
///
/// Variants fall into two groups. "Reported" failures (see
/// [`InstallError::is_reported`]) are expected outcomes such as a missing
/// archive or a rejected executable pick; the orchestrator turns them into an
/// [`InstallOutcome::Failed`](crate::InstallOutcome). Everything else is
/// unexpected and propagates to the caller with the staging area retained.
#[derive(Error, Debug)]
pub enum InstallError {
    /// File system I/O errors with file context
    #[error("File operation failed on '{path}' while {operation}")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// Archive file does not exist
    #[error("Archive not found: {0}")]
    ArchiveNotFound(PathBuf),

    /// Extraction collaborator failed
    #[error("Extraction of '{archive}' failed: {reason}")]
    Extraction {
        archive: PathBuf,
        reason: String,
    },

    /// No install directory could be determined for the platform
    #[error("Install destination unresolved for platform '{platform}': {message}")]
    DestinationUnresolved {
        platform: String,
        message: String,
    },

    /// Installer-type archive without a usable setup binary
    #[error("No setup executable found in '{0}'")]
    SetupNotFound(PathBuf),

    /// The operating system refused to start the child process
    #[error("Failed to launch '{program}'")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The installer finished but no success signal was found and the operator declined
    #[error("Installation into '{0}' was not confirmed")]
    InstallNotConfirmed(PathBuf),

    /// No launchable executable was found
    #[error("No executable found in '{root}': {reason}")]
    ExecutableNotFound {
        root: PathBuf,
        reason: String,
    },

    /// Several executables matched and the operator did not accept any of them
    #[error("Executable selection in '{0}' was not confirmed")]
    ExecutableNotConfirmed(PathBuf),

    /// Game folder could not be located in the extracted tree
    #[error("Game content not found in '{0}'")]
    ContentNotFound(PathBuf),

    /// Run cancelled before a process or extraction stage started
    #[error("Install cancelled: {reason}")]
    Cancelled { reason: String },

    /// Settings file could not be read or parsed
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A blocking task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Types of file operations for error context
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
    Move,
    Copy,
    Metadata,
    CreateDir,
    ListDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Delete => write!(f, "deleting"),
            FileOperation::Move => write!(f, "moving"),
            FileOperation::Copy => write!(f, "copying"),
            FileOperation::Metadata => write!(f, "reading metadata"),
            FileOperation::CreateDir => write!(f, "creating directory"),
            FileOperation::ListDir => write!(f, "listing directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, InstallError>;

impl InstallError {
    /// Wrap an I/O error with the path and operation it happened on
    pub fn fs(path: impl Into<PathBuf>, operation: FileOperation, source: std::io::Error) -> Self {
        InstallError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Whether this error is an expected, user-facing failure
    ///
    /// Reported failures end the run with a status message. Anything else is
    /// treated as unexpected and re-raised after logging.
    pub fn is_reported(&self) -> bool {
        match self {
            InstallError::ArchiveNotFound(_)
            | InstallError::Extraction { .. }
            | InstallError::DestinationUnresolved { .. }
            | InstallError::SetupNotFound(_)
            | InstallError::Launch { .. }
            | InstallError::InstallNotConfirmed(_)
            | InstallError::ExecutableNotFound { .. }
            | InstallError::ExecutableNotConfirmed(_)
            | InstallError::ContentNotFound(_)
            | InstallError::Cancelled { .. } => true,
            InstallError::FileSystem { .. }
            | InstallError::Configuration { .. }
            | InstallError::Task(_) => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            InstallError::FileSystem { .. } => "file_system",
            InstallError::ArchiveNotFound(_) => "archive_not_found",
            InstallError::Extraction { .. } => "extraction",
            InstallError::DestinationUnresolved { .. } => "destination_unresolved",
            InstallError::SetupNotFound(_) => "setup_not_found",
            InstallError::Launch { .. } => "launch",
            InstallError::InstallNotConfirmed(_) => "install_not_confirmed",
            InstallError::ExecutableNotFound { .. } => "executable_not_found",
            InstallError::ExecutableNotConfirmed(_) => "executable_not_confirmed",
            InstallError::ContentNotFound(_) => "content_not_found",
            InstallError::Cancelled { .. } => "cancelled",
            InstallError::Configuration { .. } => "configuration",
            InstallError::Task(_) => "task",
        }
    }

    /// Get severity level for error prioritization
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            InstallError::Cancelled { .. } => ErrorSeverity::Low,
            InstallError::ExecutableNotConfirmed(_) | InstallError::InstallNotConfirmed(_) => {
                ErrorSeverity::Medium
            }
            InstallError::ArchiveNotFound(_)
            | InstallError::Extraction { .. }
            | InstallError::DestinationUnresolved { .. }
            | InstallError::SetupNotFound(_)
            | InstallError::ExecutableNotFound { .. }
            | InstallError::ContentNotFound(_)
            | InstallError::Configuration { .. } => ErrorSeverity::High,
            InstallError::FileSystem { .. } | InstallError::Launch { .. } | InstallError::Task(_) => {
                ErrorSeverity::Critical
            }
        }
    }

    /// Create a detailed error report for debugging
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);
        report.push_str(&format!("Category: {}\n", self.category()));
        report.push_str(&format!("Severity: {:?}\n", self.severity()));

        if let Some(source) = self.source() {
            report.push_str(&format!("Root cause: {}\n", source));
        }

        report
    }
}

/// Error severity levels for prioritization
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<tokio::task::JoinError> for InstallError {
    fn from(error: tokio::task::JoinError) -> Self {
        InstallError::Task(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reported_errors_are_user_facing() {
        assert!(InstallError::ArchiveNotFound(PathBuf::from("a.zip")).is_reported());
        assert!(InstallError::ExecutableNotConfirmed(PathBuf::from("dir")).is_reported());
        assert!(
            !InstallError::fs(
                "x",
                FileOperation::Read,
                std::io::Error::new(std::io::ErrorKind::Other, "boom")
            )
            .is_reported()
        );
    }

    #[test]
    fn detailed_report_includes_root_cause() {
        let err = InstallError::fs(
            "/tmp/stage",
            FileOperation::CreateDir,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let report = err.detailed_report();
        assert!(report.contains("creating directory"));
        assert!(report.contains("Category: file_system"));
        assert!(report.contains("Root cause: denied"));
    }
}
