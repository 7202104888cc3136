//! Configuration types for the install pipeline
//!
//! Two layers live here. [`PlatformInstallPolicy`] and [`InstallerSettings`]
//! are the persisted, per-platform records the host library edits.
//! [`InstallerConfig`] holds the runtime knobs of the orchestrator itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{InstallError, Result};
use crate::core::PlatformRef;

/// Silent flags understood by Inno Setup installers
pub const DEFAULT_SILENT_ARGS: &str = "/SILENT /SUPPRESSMSGBOXES /NORESTART";

/// Phrase Inno Setup writes to its log when the install finished cleanly
pub const DEFAULT_SUCCESS_PHRASE: &str = "Installation process succeeded";

/// How base and update/DLC installers are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InstallerMode {
    /// The operator drives the installer UI
    #[default]
    Manual,
    /// Recognized installers run unattended
    AutoSilent,
}

/// Where copied OST/bonus material ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContentPlacement {
    /// `<configured root>/<title>`
    Centralized,
    /// `<game dir>/<OST|Bonus>`
    #[default]
    GameFolder,
}

/// Per-platform install policy
///
/// Loaded before a run and read-only while it executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PlatformInstallPolicy {
    pub installer_mode: InstallerMode,
    /// Extra arguments for silent installs; empty means [`DEFAULT_SILENT_ARGS`]
    pub silent_install_args: String,

    pub install_ost: bool,
    pub ost_placement: ContentPlacement,
    pub ost_path: Option<PathBuf>,

    pub install_bonus: bool,
    pub bonus_placement: ContentPlacement,
    pub bonus_path: Option<PathBuf>,

    #[serde(rename = "InstallPreReqs")]
    pub install_prereqs: bool,
    #[serde(rename = "PreReqsPath")]
    pub prereqs_path: Option<PathBuf>,

    /// Non-Windows platforms: the archive is the playable unit
    pub self_contained: bool,
    /// Non-Windows platforms: extensions to look for, in priority order
    pub target_files: Vec<String>,
}

impl Default for PlatformInstallPolicy {
    fn default() -> Self {
        Self {
            installer_mode: InstallerMode::Manual,
            silent_install_args: String::new(),
            install_ost: false,
            ost_placement: ContentPlacement::GameFolder,
            ost_path: None,
            install_bonus: false,
            bonus_placement: ContentPlacement::GameFolder,
            bonus_path: None,
            install_prereqs: false,
            prereqs_path: None,
            self_contained: false,
            target_files: Vec::new(),
        }
    }
}

impl PlatformInstallPolicy {
    /// Silent arguments split into tokens, falling back to the Inno defaults
    pub fn silent_args(&self) -> Vec<String> {
        let configured = self.silent_install_args.trim();
        let args = if configured.is_empty() {
            DEFAULT_SILENT_ARGS
        } else {
            configured
        };
        args.split_whitespace().map(str::to_string).collect()
    }

    pub fn is_auto_silent(&self) -> bool {
        self.installer_mode == InstallerMode::AutoSilent
    }
}

/// One mapped platform in the settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlatformEntry {
    pub platform: String,
    /// Library directory titles of this platform are installed under
    #[serde(default)]
    pub install_root: Option<PathBuf>,
    #[serde(default)]
    pub policy: PlatformInstallPolicy,
}

/// Persisted settings: one record per mapped platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstallerSettings {
    pub platforms: Vec<PlatformEntry>,
    /// Overrides the staging root of [`InstallerConfig`]
    pub temp_root: Option<PathBuf>,
}

impl InstallerSettings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| InstallError::Configuration {
            message: format!("cannot read settings file '{}'", path.display()),
            source: Some(Box::new(e)),
        })?;
        let settings = Self::from_json(&raw)?;
        debug!(path = %path.display(), platforms = settings.platforms.len(), "loaded installer settings");
        Ok(settings)
    }

    /// Parse settings from a JSON string
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| InstallError::Configuration {
            message: "settings file is not valid JSON".to_string(),
            source: Some(Box::new(e)),
        })
    }

    /// Look up a platform entry by name (case-insensitive)
    pub fn platform(&self, platform: &PlatformRef) -> Option<&PlatformEntry> {
        self.platforms
            .iter()
            .find(|entry| entry.platform.eq_ignore_ascii_case(platform.name()))
    }

    /// Policy for a platform, defaulting when the platform is not mapped
    pub fn policy_for(&self, platform: &PlatformRef) -> PlatformInstallPolicy {
        self.platform(platform)
            .map(|entry| entry.policy.clone())
            .unwrap_or_default()
    }

    /// Configured install roots keyed by platform name
    pub fn install_roots(&self) -> HashMap<String, PathBuf> {
        self.platforms
            .iter()
            .filter_map(|entry| {
                entry
                    .install_root
                    .as_ref()
                    .map(|root| (entry.platform.to_lowercase(), root.clone()))
            })
            .collect()
    }
}

/// Runtime configuration of the orchestrator
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Parent directory for private staging areas
    pub temp_root: PathBuf,
    /// Phrase searched for in installer logs
    pub success_phrase: String,
    /// Whether an existing install folder short-circuits the base installer
    pub skip_when_installed: bool,
    /// Folders skipped by the recursive executable search
    pub excluded_subfolders: Vec<String>,
}

impl InstallerConfig {
    /// Apply the persisted staging override, if any
    pub fn with_settings(mut self, settings: &InstallerSettings) -> Self {
        if let Some(root) = &settings.temp_root {
            self.temp_root = root.clone();
        }
        self
    }

    pub fn with_temp_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.temp_root = root.into();
        self
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir().join("installer-staging"),
            success_phrase: DEFAULT_SUCCESS_PHRASE.to_string(),
            skip_when_installed: true,
            excluded_subfolders: ["_CommonRedist", "_Redist", "Redist", "DirectX", "vcredist"]
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_silent_args_use_inno_defaults() {
        let policy = PlatformInstallPolicy::default();
        assert_eq!(policy.silent_args(), vec!["/SILENT", "/SUPPRESSMSGBOXES", "/NORESTART"]);

        let policy = PlatformInstallPolicy {
            silent_install_args: " /VERYSILENT  /SP- ".to_string(),
            ..Default::default()
        };
        assert_eq!(policy.silent_args(), vec!["/VERYSILENT", "/SP-"]);
    }

    #[test]
    fn settings_parse_pascal_case_records() {
        let raw = r#"{
            "Platforms": [
                {
                    "Platform": "Windows",
                    "InstallRoot": "/games/pc",
                    "Policy": {
                        "InstallerMode": "AutoSilent",
                        "InstallPreReqs": true,
                        "PreReqsPath": "/games/prereqs",
                        "InstallOst": true,
                        "OstPlacement": "Centralized",
                        "OstPath": "/music"
                    }
                },
                { "Platform": "SNES", "Policy": { "SelfContained": true, "TargetFiles": [".sfc", ".smc"] } }
            ]
        }"#;

        let settings = InstallerSettings::from_json(raw).unwrap();
        let windows = settings.policy_for(&PlatformRef::new("windows"));
        assert!(windows.is_auto_silent());
        assert!(windows.install_prereqs);
        assert_eq!(windows.prereqs_path, Some(PathBuf::from("/games/prereqs")));
        assert_eq!(windows.ost_placement, ContentPlacement::Centralized);
        assert!(!windows.install_bonus);

        let snes = settings.policy_for(&PlatformRef::new("SNES"));
        assert!(snes.self_contained);
        assert_eq!(snes.target_files, vec![".sfc", ".smc"]);

        assert_eq!(
            settings.install_roots().get("windows"),
            Some(&PathBuf::from("/games/pc"))
        );
    }

    #[test]
    fn unknown_platform_gets_default_policy() {
        let settings = InstallerSettings::default();
        assert_eq!(
            settings.policy_for(&PlatformRef::new("Amiga")),
            PlatformInstallPolicy::default()
        );
    }

    #[test]
    fn malformed_settings_are_configuration_errors() {
        let err = InstallerSettings::from_json("{ not json").unwrap_err();
        assert!(matches!(err, InstallError::Configuration { .. }));
    }
}
