//! Launch executable resolution
//!
//! Given an install root, find the single program to launch. A
//! `manifest.json` naming an existing executable wins outright. Otherwise the
//! executables on disk are filtered and, when more than one remains, the
//! caller must get the operator to confirm a pick.

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::files::lexical_normalize;
use crate::core::naming;
use crate::detect::arch;

/// Manifest file name looked up at the install root (case-insensitive)
pub const MANIFEST_FILE: &str = "manifest.json";

/// Result of resolving the launch executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutableResolution {
    /// Nothing launchable was found
    Failed { reason: String },
    /// Exactly one answer; no confirmation needed
    Success { path: PathBuf, arguments: Vec<String> },
    /// Several candidates; the operator must accept `preferred` or pick another
    NeedsConfirmation { preferred: PathBuf, candidates: Vec<PathBuf> },
}

impl ExecutableResolution {
    pub fn needs_confirmation(&self) -> bool {
        matches!(self, ExecutableResolution::NeedsConfirmation { .. })
    }
}

#[derive(Debug, Deserialize)]
struct LaunchManifest {
    #[serde(rename = "Executable", default)]
    executable: Option<String>,
    #[serde(rename = "Arguments", default)]
    arguments: Option<Vec<String>>,
}

/// Resolve the executable to launch for an install root
///
/// `excluded_subfolders` are folder names (case-insensitive) never searched
/// for candidates; reserved optional-content folders are always skipped.
pub fn resolve(install_root: &Path, display_name: Option<&str>, excluded_subfolders: &[String]) -> ExecutableResolution {
    if let Some(resolution) = resolve_from_manifest(install_root) {
        return resolution;
    }

    let candidates = collect_candidates(install_root, excluded_subfolders);
    debug!(root = %install_root.display(), candidates = candidates.len(), "collected executable candidates");

    match candidates.len() {
        0 => ExecutableResolution::Failed {
            reason: format!("no executable found under {}", install_root.display()),
        },
        1 => ExecutableResolution::Success {
            path: candidates[0].clone(),
            arguments: Vec::new(),
        },
        _ => {
            let preferred = preferred_candidate(&candidates, display_name);
            ExecutableResolution::NeedsConfirmation { preferred, candidates }
        }
    }
}

/// Substitute `%GAME_DIR%`-style placeholders (case-insensitive)
pub fn expand_placeholders(value: &str, game_dir: &Path) -> String {
    let home = home_dir();
    let user_profile = env_path("USERPROFILE").unwrap_or_else(|| home.clone());
    let replacements = [
        ("%GAME_DIR%", game_dir.to_path_buf()),
        (
            "%LOCALAPPDATA%",
            env_path("LOCALAPPDATA").unwrap_or_else(|| home.join(".local").join("share")),
        ),
        ("%APPDATA%", env_path("APPDATA").unwrap_or_else(|| home.join(".config"))),
        ("%USERPROFILE%", user_profile.clone()),
        ("%DOCUMENTS%", user_profile.join("Documents")),
    ];

    let mut expanded = value.to_string();
    for (token, replacement) in &replacements {
        expanded = replace_ignore_case(&expanded, token, &replacement.display().to_string());
    }
    expanded
}

fn resolve_from_manifest(install_root: &Path) -> Option<ExecutableResolution> {
    let manifest_path = find_manifest(install_root)?;
    let raw = match std::fs::read_to_string(&manifest_path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %manifest_path.display(), error = %e, "unreadable manifest, using heuristics");
            return None;
        }
    };
    let manifest: LaunchManifest = match serde_json::from_str(&raw) {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!(path = %manifest_path.display(), error = %e, "malformed manifest, using heuristics");
            return None;
        }
    };

    let declared = manifest.executable.filter(|e| !e.trim().is_empty())?;
    let path = manifest_path_to_fs(&expand_placeholders(&declared, install_root), install_root);
    if !path.is_file() {
        warn!(declared = %declared, resolved = %path.display(), "manifest executable does not exist, using heuristics");
        return None;
    }

    let arguments = manifest
        .arguments
        .unwrap_or_default()
        .iter()
        .map(|arg| expand_placeholders(arg, install_root))
        .collect();

    debug!(executable = %path.display(), "resolved executable from manifest");
    Some(ExecutableResolution::Success { path, arguments })
}

fn find_manifest(root: &Path) -> Option<PathBuf> {
    std::fs::read_dir(root)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| {
            path.is_file()
                && path
                    .file_name()
                    .map(|n| n.to_string_lossy().eq_ignore_ascii_case(MANIFEST_FILE))
                    .unwrap_or(false)
        })
}

/// Turn a manifest path into a file system path, whichever separator it uses
fn manifest_path_to_fs(value: &str, root: &Path) -> PathBuf {
    let unified: String = value
        .trim()
        .chars()
        .map(|c| if c == '\\' || c == '/' { MAIN_SEPARATOR } else { c })
        .collect();
    let path = PathBuf::from(unified);
    let joined = if path.is_absolute() { path } else { root.join(path) };
    lexical_normalize(&joined)
}

fn collect_candidates(root: &Path, excluded_subfolders: &[String]) -> Vec<PathBuf> {
    let top_level = executables_in(root);
    if !top_level.is_empty() {
        return top_level;
    }

    let mut found = Vec::new();
    let mut pending = subfolders(root, excluded_subfolders);
    while let Some(dir) = pending.pop() {
        found.extend(executables_in(&dir));
        pending.extend(subfolders(&dir, excluded_subfolders));
    }
    found.sort();
    found
}

fn executables_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut executables: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && naming::is_executable(path) && !naming::is_uninstaller(path))
        .collect();
    executables.sort();
    executables
}

fn subfolders(dir: &Path, excluded_subfolders: &[String]) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            !naming::is_reserved_folder(&name)
                && !excluded_subfolders.iter().any(|ex| ex.eq_ignore_ascii_case(&name))
        })
        .map(|entry| entry.path())
        .collect()
}

fn preferred_candidate(candidates: &[PathBuf], display_name: Option<&str>) -> PathBuf {
    let is_64bit = arch::is_64bit_host();
    let wanted = display_name.map(|name| normalized_stem(name));

    candidates
        .iter()
        .min_by_key(|path| {
            let stem = path
                .file_stem()
                .map(|s| normalized_stem(&s.to_string_lossy()))
                .unwrap_or_default();
            let name_matches = wanted.as_deref() == Some(stem.as_str());
            (
                naming::is_setup_named(path),
                path.as_os_str().len(),
                !name_matches,
                arch::penalty(arch::detect_cached(path), is_64bit),
                (*path).clone(),
            )
        })
        .cloned()
        .unwrap_or_else(|| candidates[0].clone())
}

fn normalized_stem(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

fn replace_ignore_case(haystack: &str, token: &str, replacement: &str) -> String {
    let lower_token = token.to_ascii_lowercase();
    let mut result = String::with_capacity(haystack.len());
    let mut rest = haystack;

    while let Some(idx) = rest.to_ascii_lowercase().find(&lower_token) {
        result.push_str(&rest[..idx]);
        result.push_str(replacement);
        rest = &rest[idx + token.len()..];
    }
    result.push_str(rest);
    result
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn home_dir() -> PathBuf {
    env_path("USERPROFILE")
        .or_else(|| env_path("HOME"))
        .unwrap_or_else(std::env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::arch::pe_image;
    use tempfile::tempdir;

    fn touch(path: &Path, content: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn empty_directory_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            resolve(dir.path(), None, &[]),
            ExecutableResolution::Failed { .. }
        ));
    }

    #[test]
    fn single_executable_needs_no_confirmation() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("game.exe"), b"MZ");
        touch(&dir.path().join("unins000.exe"), b"MZ");
        touch(&dir.path().join("readme.txt"), b"hi");

        assert_eq!(
            resolve(dir.path(), Some("Game"), &[]),
            ExecutableResolution::Success {
                path: dir.path().join("game.exe"),
                arguments: vec![],
            }
        );
    }

    #[test]
    fn two_executables_need_confirmation_and_prefer_non_setup() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a.exe"), b"MZ");
        touch(&dir.path().join("setup.exe"), b"MZ");

        match resolve(dir.path(), None, &[]) {
            ExecutableResolution::NeedsConfirmation { preferred, candidates } => {
                assert_eq!(preferred, dir.path().join("a.exe"));
                assert_eq!(
                    candidates,
                    vec![dir.path().join("a.exe"), dir.path().join("setup.exe")]
                );
            }
            other => panic!("expected confirmation, got {:?}", other),
        }
    }

    #[test]
    fn resolution_is_idempotent() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("launcher.exe"), b"MZ");
        touch(&dir.path().join("game.exe"), b"MZ");
        touch(&dir.path().join("config.exe"), b"MZ");

        let first = resolve(dir.path(), Some("Game"), &[]);
        let second = resolve(dir.path(), Some("Game"), &[]);
        assert_eq!(first, second);
        assert!(first.needs_confirmation());
    }

    #[test]
    fn shorter_path_then_display_name_then_architecture() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("game.exe"), &pe_image(0x014C));
        touch(&dir.path().join("tool.exe"), &pe_image(0x8664));
        touch(&dir.path().join("editor.exe"), b"MZ");

        match resolve(dir.path(), Some("Game"), &[]) {
            ExecutableResolution::NeedsConfirmation { preferred, .. } => {
                assert_eq!(preferred, dir.path().join("game.exe"));
            }
            other => panic!("expected confirmation, got {:?}", other),
        }

        match resolve(dir.path(), None, &[]) {
            ExecutableResolution::NeedsConfirmation { preferred, .. } => {
                // x64 beats x86 on a 64-bit host; the lexical order decides otherwise
                let expected = if arch::is_64bit_host() { "tool.exe" } else { "game.exe" };
                assert_eq!(preferred, dir.path().join(expected));
            }
            other => panic!("expected confirmation, got {:?}", other),
        }
    }

    #[test]
    fn manifest_wins_over_other_executables() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a.exe"), b"MZ");
        touch(&dir.path().join("bin").join("real.exe"), b"MZ");
        touch(
            &dir.path().join("Manifest.json"),
            br#"{ "Executable": "%GAME_DIR%\\bin\\real.exe", "Arguments": ["-windowed", "-data=%game_dir%/data"] }"#,
        );
        touch(&dir.path().join("b.exe"), b"MZ");

        match resolve(dir.path(), None, &[]) {
            ExecutableResolution::Success { path, arguments } => {
                assert_eq!(path, dir.path().join("bin").join("real.exe"));
                assert_eq!(arguments[0], "-windowed");
                assert_eq!(arguments[1], format!("-data={}/data", dir.path().display()));
            }
            other => panic!("expected manifest success, got {:?}", other),
        }
    }

    #[test]
    fn relative_manifest_path_is_joined_to_root() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("x64").join("game.exe"), b"MZ");
        touch(&dir.path().join("manifest.json"), br#"{ "Executable": "x64/./game.exe" }"#);

        assert_eq!(
            resolve(dir.path(), None, &[]),
            ExecutableResolution::Success {
                path: dir.path().join("x64").join("game.exe"),
                arguments: vec![],
            }
        );
    }

    #[test]
    fn broken_manifest_degrades_to_heuristics() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("game.exe"), b"MZ");
        touch(&dir.path().join("manifest.json"), b"{ this is not json");
        assert!(matches!(
            resolve(dir.path(), None, &[]),
            ExecutableResolution::Success { .. }
        ));

        touch(&dir.path().join("manifest.json"), br#"{ "Executable": "missing.exe" }"#);
        assert!(matches!(
            resolve(dir.path(), None, &[]),
            ExecutableResolution::Success { .. }
        ));

        touch(&dir.path().join("manifest.json"), br#"{ "Arguments": ["-x"] }"#);
        assert!(matches!(
            resolve(dir.path(), None, &[]),
            ExecutableResolution::Success { .. }
        ));
    }

    #[test]
    fn nested_search_skips_excluded_and_reserved_folders() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("bin").join("game.exe"), b"MZ");
        touch(&dir.path().join("redist").join("vcredist.exe"), b"MZ");
        touch(&dir.path().join("DLC").join("dlc_setup.exe"), b"MZ");

        assert_eq!(
            resolve(dir.path(), None, &["Redist".to_string()]),
            ExecutableResolution::Success {
                path: dir.path().join("bin").join("game.exe"),
                arguments: vec![],
            }
        );
        assert!(resolve(dir.path(), None, &[]).needs_confirmation());
    }

    #[test]
    fn placeholder_replacement_is_case_insensitive() {
        assert_eq!(
            replace_ignore_case("%game_dir%/a/%GAME_DIR%", "%GAME_DIR%", "/g"),
            "/g/a//g"
        );
        assert_eq!(
            expand_placeholders("%Game_Dir%", Path::new("/library/Game")),
            "/library/Game"
        );
    }
}
