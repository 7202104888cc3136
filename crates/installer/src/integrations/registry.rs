//! Installed-application registry lookup
//!
//! One of the installer success signals: an uninstall entry whose
//! `InstallLocation` points at the target directory.

use std::path::{Path, PathBuf};

use crate::core::files;

/// Source of installed-application locations
pub trait InstalledApps: Send + Sync {
    /// Install locations of every registered application
    fn install_locations(&self) -> Vec<PathBuf>;

    /// Whether any registered application lives at `target` or below it
    fn has_entry_under(&self, target: &Path) -> bool {
        self.install_locations()
            .iter()
            .any(|location| files::is_within(location, target))
    }
}

/// Registry with no entries, for platforms without an uninstall registry
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegistry;

impl InstalledApps for NoRegistry {
    fn install_locations(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Windows uninstall registry (HKLM, HKCU and the WOW6432Node view)
#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsUninstallRegistry;

#[cfg(windows)]
impl InstalledApps for WindowsUninstallRegistry {
    fn install_locations(&self) -> Vec<PathBuf> {
        use winreg::RegKey;
        use winreg::enums::*;

        const UNINSTALL_KEYS: [&str; 2] = [
            r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
            r"SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall",
        ];

        let mut locations = Vec::new();
        for hive in [HKEY_LOCAL_MACHINE, HKEY_CURRENT_USER] {
            let root = RegKey::predef(hive);
            for key_path in UNINSTALL_KEYS {
                let Ok(uninstall) = root.open_subkey(key_path) else {
                    continue;
                };
                for name in uninstall.enum_keys().flatten() {
                    let Ok(app) = uninstall.open_subkey(&name) else {
                        continue;
                    };
                    if let Ok(location) = app.get_value::<String, _>("InstallLocation") {
                        let location = location.trim().trim_matches('"');
                        if !location.is_empty() {
                            locations.push(PathBuf::from(location));
                        }
                    }
                }
            }
        }

        tracing::trace!(entries = locations.len(), "read uninstall registry");
        locations
    }
}

/// The registry appropriate for the current platform
pub fn system_registry() -> Box<dyn InstalledApps> {
    #[cfg(windows)]
    {
        Box::new(WindowsUninstallRegistry)
    }
    #[cfg(not(windows))]
    {
        Box::new(NoRegistry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<PathBuf>);

    impl InstalledApps for Fixed {
        fn install_locations(&self) -> Vec<PathBuf> {
            self.0.clone()
        }
    }

    #[test]
    fn entry_under_target_matches() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Game");
        let registry = Fixed(vec![PathBuf::from("/other/app"), target.join("bin")]);
        assert!(registry.has_entry_under(&target));
        assert!(!registry.has_entry_under(&dir.path().join("Else")));
        assert!(!NoRegistry.has_entry_under(&target));
    }
}
