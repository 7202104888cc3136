//! Extraction collaborator contract and implementations
//!
//! Archive decoding is not done here. The orchestrator only needs something
//! that turns an archive into a directory tree; [`SevenZipExtractor`] drives
//! the 7-Zip command line tool and [`DirectoryExtractor`] accepts folders that
//! are already unpacked.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::core::error::{InstallError, Result};
use crate::core::files;

/// Where extracted content lands relative to the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractBehavior {
    /// No extraction; the destination is returned as-is
    None,
    /// Into `<destination>/<archive stem>`
    Subfolder,
    /// Straight into `<destination>`
    Direct,
}

impl ExtractBehavior {
    /// Directory that will hold the extracted root for this behavior
    pub fn target_dir(&self, archive: &Path, destination: &Path) -> PathBuf {
        match self {
            ExtractBehavior::Subfolder => {
                let stem = archive
                    .file_stem()
                    .map(|s| s.to_os_string())
                    .unwrap_or_else(|| "extracted".into());
                destination.join(stem)
            }
            ExtractBehavior::None | ExtractBehavior::Direct => destination.to_path_buf(),
        }
    }
}

/// Trait for extraction services
///
/// Implementations unpack `archive` under `destination` according to
/// `behavior` and return the directory that holds the extracted root.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, archive: &Path, destination: &Path, behavior: ExtractBehavior) -> Result<PathBuf>;
}

/// Extractor backed by the `7z` command line tool
#[derive(Debug, Clone)]
pub struct SevenZipExtractor {
    program: PathBuf,
}

impl SevenZipExtractor {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self { program: program.into() }
    }
}

impl Default for SevenZipExtractor {
    fn default() -> Self {
        Self::new("7z")
    }
}

#[async_trait]
impl Extractor for SevenZipExtractor {
    async fn extract(&self, archive: &Path, destination: &Path, behavior: ExtractBehavior) -> Result<PathBuf> {
        let target = behavior.target_dir(archive, destination);
        if behavior == ExtractBehavior::None {
            return Ok(target);
        }

        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| InstallError::fs(&target, crate::core::FileOperation::CreateDir, e))?;

        info!(archive = %archive.display(), destination = %target.display(), "extracting archive");
        let output = Command::new(&self.program)
            .arg("x")
            .arg(archive)
            .arg(format!("-o{}", target.display()))
            .arg("-y")
            .output()
            .await
            .map_err(|e| InstallError::Extraction {
                archive: archive.to_path_buf(),
                reason: format!("cannot start {}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InstallError::Extraction {
                archive: archive.to_path_buf(),
                reason: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr.trim()
                ),
            });
        }

        debug!(archive = %archive.display(), "extraction finished");
        Ok(target)
    }
}

/// Extractor for archives that are already unpacked directories
///
/// The directory is copied, so the original stays untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryExtractor;

#[async_trait]
impl Extractor for DirectoryExtractor {
    async fn extract(&self, archive: &Path, destination: &Path, behavior: ExtractBehavior) -> Result<PathBuf> {
        let target = behavior.target_dir(archive, destination);
        if behavior == ExtractBehavior::None {
            return Ok(target);
        }
        if !archive.is_dir() {
            return Err(InstallError::Extraction {
                archive: archive.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let report = files::copy_tree(archive, &target).await?;
        if report.failures > 0 {
            return Err(InstallError::Extraction {
                archive: archive.to_path_buf(),
                reason: format!("{} entries could not be copied", report.failures),
            });
        }
        Ok(target)
    }
}
