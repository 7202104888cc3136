//! Core types used throughout the install pipeline
//!
//! This module contains the fundamental types that all other modules depend on.
//! By organizing these in a core module, we make the dependency relationships clear.

pub mod error;
pub mod files;
pub mod naming;
pub mod progress;

// Re-export main types for convenience
pub use error::{ErrorSeverity, FileOperation, InstallError, Result};
pub use progress::{InstallPhase, InstallProgress, ProgressCallback};

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::PlatformInstallPolicy;

/// How an archive delivers its base payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallType {
    /// Neither the file name nor the tree gave a verdict
    Unknown,
    /// Content is produced by running a setup program
    Installer,
    /// Content is usable as extracted
    Portable,
}

impl fmt::Display for InstallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallType::Unknown => write!(f, "unknown"),
            InstallType::Installer => write!(f, "installer"),
            InstallType::Portable => write!(f, "portable"),
        }
    }
}

/// Kinds of optional content that may ship next to a base payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentKind {
    Update,
    Dlc,
    Ost,
    Bonus,
    PreReqs,
}

impl ContentKind {
    /// Every kind, in the order the orchestrator installs them
    pub const ALL: [ContentKind; 5] = [
        ContentKind::Update,
        ContentKind::Dlc,
        ContentKind::Ost,
        ContentKind::Bonus,
        ContentKind::PreReqs,
    ];

    /// Reserved folder name (compared case-insensitively)
    pub fn folder_name(&self) -> &'static str {
        match self {
            ContentKind::Update => "update",
            ContentKind::Dlc => "dlc",
            ContentKind::Ost => "ost",
            ContentKind::Bonus => "bonus",
            ContentKind::PreReqs => "pre-reqs",
        }
    }

    /// Update and DLC folders carry installers; the rest are copied as files
    pub fn is_installable(&self) -> bool {
        matches!(self, ContentKind::Update | ContentKind::Dlc)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Update => write!(f, "update"),
            ContentKind::Dlc => write!(f, "DLC"),
            ContentKind::Ost => write!(f, "OST"),
            ContentKind::Bonus => write!(f, "bonus"),
            ContentKind::PreReqs => write!(f, "pre-reqs"),
        }
    }
}

/// An optional content folder found at the top of the extracted tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRoot {
    pub kind: ContentKind,
    pub path: PathBuf,
}

/// Scan a directory (top level only) for reserved optional-content folders
///
/// At most one root is returned per kind; the first match in directory order
/// wins. Missing or unreadable directories yield no roots.
pub fn discover_content_roots(base: &Path) -> Vec<ContentRoot> {
    let Ok(entries) = std::fs::read_dir(base) else {
        return Vec::new();
    };

    let mut roots: Vec<ContentRoot> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(kind) = naming::reserved_content_kind(&name) {
            if roots.iter().all(|r| r.kind != kind) {
                roots.push(ContentRoot { kind, path });
            }
        }
    }

    roots.sort_by_key(|r| r.kind);
    roots
}

/// Opaque reference to a platform entry in the host library
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformRef(pub String);

impl PlatformRef {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything one orchestration run needs
///
/// Built once by the caller and never mutated while the run is in flight.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Archive as downloaded from the catalog
    pub archive_path: PathBuf,
    /// Tree that was already extracted elsewhere, if any
    pub extracted_path: Option<PathBuf>,
    /// Library directory the title is installed under; resolved through the
    /// destination resolver when absent
    pub install_dir: Option<PathBuf>,
    /// Where the game should finally live when it differs from the install target
    pub final_dir: Option<PathBuf>,
    /// Library platform the title belongs to
    pub platform: PlatformRef,
    /// Policy for that platform
    pub policy: PlatformInstallPolicy,
    /// Title shown to the operator and used for folder names
    pub display_name: String,
}

impl InstallRequest {
    /// Create a request with the title derived from the archive name
    pub fn new<P: Into<PathBuf>>(archive_path: P, platform: PlatformRef, policy: PlatformInstallPolicy) -> Self {
        let archive_path = archive_path.into();
        let display_name = naming::title_from_archive(&archive_path);
        Self {
            archive_path,
            extracted_path: None,
            install_dir: None,
            final_dir: None,
            platform,
            policy,
            display_name,
        }
    }

    pub fn with_display_name<S: Into<String>>(mut self, name: S) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_extracted_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.extracted_path = Some(path.into());
        self
    }

    pub fn with_install_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.install_dir = Some(path.into());
        self
    }

    pub fn with_final_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.final_dir = Some(path.into());
        self
    }

    /// Folder name the title gets on disk
    pub fn folder_name(&self) -> String {
        naming::sanitize_folder_name(&self.display_name)
    }
}

/// Result of one orchestration run
#[derive(Debug, Clone, PartialEq)]
pub enum InstallOutcome {
    Success {
        executable: PathBuf,
        arguments: Vec<String>,
        install_type: InstallType,
        game_dir: PathBuf,
    },
    Failed {
        reason: String,
    },
}

impl InstallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InstallOutcome::Success { .. })
    }

    pub fn executable(&self) -> Option<&Path> {
        match self {
            InstallOutcome::Success { executable, .. } => Some(executable),
            InstallOutcome::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_reserved_folders_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("DLC")).unwrap();
        std::fs::create_dir(dir.path().join("Pre-Reqs")).unwrap();
        std::fs::create_dir(dir.path().join("Game")).unwrap();
        std::fs::write(dir.path().join("ost"), b"not a folder").unwrap();

        let roots = discover_content_roots(dir.path());
        let kinds: Vec<_> = roots.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![ContentKind::Dlc, ContentKind::PreReqs]);
        assert_eq!(roots[0].path, dir.path().join("DLC"));
    }

    #[test]
    fn missing_base_has_no_roots() {
        assert!(discover_content_roots(Path::new("/definitely/not/here")).is_empty());
    }

    #[test]
    fn request_derives_title_from_archive() {
        let request = InstallRequest::new(
            "/downloads/Space: Game (Installer).zip",
            PlatformRef::new("PC"),
            PlatformInstallPolicy::default(),
        );
        assert_eq!(request.display_name, "Space: Game");
        assert_eq!(request.folder_name(), "Space - Game");
    }
}
