//! Install destination resolution
//!
//! Maps a library platform entry to the directory titles are installed under.
//! The host library owns the platform records; the orchestrator only sees the
//! [`DestinationResolver`] contract.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{InstallerMode, InstallerSettings};
use crate::core::PlatformRef;

/// Outcome of a destination lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationResolution {
    pub success: bool,
    pub directory: Option<PathBuf>,
    pub message: String,
}

impl DestinationResolution {
    pub fn found<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            success: true,
            directory: Some(directory.into()),
            message: String::new(),
        }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            directory: None,
            message: message.into(),
        }
    }
}

/// Trait for mapping platforms to install directories
#[async_trait]
pub trait DestinationResolver: Send + Sync {
    async fn resolve(&self, platform: &PlatformRef, mode_hint: InstallerMode) -> DestinationResolution;
}

/// Asks the operator for a folder when nothing is configured
#[async_trait]
pub trait FolderPrompt: Send + Sync {
    async fn ask_folder(&self, platform: &PlatformRef) -> Option<PathBuf>;
}

/// Resolver backed by the install roots in [`InstallerSettings`]
///
/// Unmapped platforms fall back to the optional [`FolderPrompt`].
#[derive(Clone, Default)]
pub struct ConfiguredDestinations {
    roots: HashMap<String, PathBuf>,
    prompt: Option<Arc<dyn FolderPrompt>>,
}

impl ConfiguredDestinations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &InstallerSettings) -> Self {
        Self {
            roots: settings.install_roots(),
            prompt: None,
        }
    }

    /// Register an install root for a platform
    pub fn with_root<S: AsRef<str>, P: Into<PathBuf>>(mut self, platform: S, root: P) -> Self {
        self.roots.insert(platform.as_ref().to_lowercase(), root.into());
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn FolderPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }
}

#[async_trait]
impl DestinationResolver for ConfiguredDestinations {
    async fn resolve(&self, platform: &PlatformRef, mode_hint: InstallerMode) -> DestinationResolution {
        if let Some(root) = self.roots.get(&platform.name().to_lowercase()) {
            debug!(platform = %platform, root = %root.display(), "using configured install root");
            return DestinationResolution::found(root.clone());
        }

        if let Some(prompt) = &self.prompt {
            debug!(platform = %platform, mode = ?mode_hint, "asking operator for install root");
            if let Some(folder) = prompt.ask_folder(platform).await {
                return DestinationResolution::found(folder);
            }
            return DestinationResolution::failed("no folder was selected");
        }

        DestinationResolution::failed(format!("no install root configured for platform '{}'", platform))
    }
}
