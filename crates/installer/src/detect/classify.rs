//! Installer vs portable classification and installer signature recognition

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::core::naming::{self, INSTALLER_TAG, PORTABLE_TAG};
use crate::core::InstallType;
use crate::integrations::extract::{ExtractBehavior, Extractor};

/// ASCII marker embedded in every Inno Setup loader and setup data block
pub const INNO_SETUP_MARKER: &[u8] = b"Inno Setup";

const SCAN_CHUNK: usize = 64 * 1024;

/// Classify an archive from its name and, when available, its extracted tree
///
/// A `(installer)` or `(portable)` tag in the file name is trusted outright.
/// Otherwise the tree decides: a top-level `setup.exe` means installer, its
/// absence means portable. With neither a tag nor a tree the result is
/// [`InstallType::Unknown`].
pub fn classify(archive: &Path, extracted: Option<&Path>) -> InstallType {
    let by_name = classify_name(archive);
    if by_name != InstallType::Unknown {
        return by_name;
    }
    match extracted {
        Some(tree) => classify_tree(tree),
        None => InstallType::Unknown,
    }
}

/// Classify from the `(installer)` / `(portable)` file name tags alone
pub fn classify_name(archive: &Path) -> InstallType {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if name.contains(INSTALLER_TAG) {
        InstallType::Installer
    } else if name.contains(PORTABLE_TAG) {
        InstallType::Portable
    } else {
        InstallType::Unknown
    }
}

/// Classify an extracted tree by looking for a setup binary in its payload root
pub fn classify_tree(tree: &Path) -> InstallType {
    let root = payload_root(tree);
    let has_setup = top_level_files(&root)
        .iter()
        .any(|file| naming::is_exact_setup(file));

    if has_setup {
        InstallType::Installer
    } else {
        InstallType::Portable
    }
}

/// Directory holding the base payload of an extracted tree
///
/// Archives frequently wrap everything in one folder. When the tree has no
/// loose files and exactly one folder besides the reserved content folders,
/// that folder is the payload root.
pub fn payload_root(tree: &Path) -> PathBuf {
    let Ok(entries) = std::fs::read_dir(tree) else {
        return tree.to_path_buf();
    };

    let mut folders = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            return tree.to_path_buf();
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !naming::is_reserved_folder(&name) {
            folders.push(path);
        }
    }

    match folders.as_slice() {
        [only] => only.clone(),
        _ => tree.to_path_buf(),
    }
}

/// Scan a file for the Inno Setup marker
///
/// Only recognized installers may receive silent-mode flags; unreadable files
/// are treated as unrecognized.
pub fn is_known_installer_signature(path: &Path) -> bool {
    match file_contains(path, INNO_SETUP_MARKER) {
        Ok(found) => found,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not scan file for installer signature");
            false
        }
    }
}

/// Locate the setup binary of an installer-type payload
///
/// An exact `setup.exe` wins; otherwise any top-level executable carrying the
/// Inno Setup signature, lowest path first.
pub fn find_setup_binary(root: &Path) -> Option<PathBuf> {
    let executables: Vec<PathBuf> = top_level_files(root)
        .into_iter()
        .filter(|file| naming::is_executable(file) && !naming::is_uninstaller(file))
        .collect();

    if let Some(exact) = executables.iter().find(|file| naming::is_exact_setup(file)) {
        return Some(exact.clone());
    }

    executables
        .par_iter()
        .filter(|file| is_known_installer_signature(file))
        .min()
        .cloned()
}

/// Installer executables at the top of an update or DLC folder, sorted by name
pub fn find_installers(folder: &Path) -> Vec<PathBuf> {
    let mut installers: Vec<PathBuf> = top_level_files(folder)
        .into_iter()
        .filter(|file| naming::is_executable(file) && !naming::is_uninstaller(file))
        .collect();
    installers.sort();
    installers
}

/// Whether every path carries the Inno Setup signature
pub fn all_recognized(installers: &[PathBuf]) -> bool {
    !installers.is_empty() && installers.par_iter().all(|path| is_known_installer_signature(path))
}

/// Classify by name, extracting into a disposable directory when that is inconclusive
pub async fn classify_with_fallback(
    archive: &Path,
    extractor: &dyn Extractor,
    temp_root: &Path,
) -> InstallType {
    let by_name = classify_name(archive);
    if by_name != InstallType::Unknown {
        return by_name;
    }

    if let Err(e) = tokio::fs::create_dir_all(temp_root).await {
        warn!(path = %temp_root.display(), error = %e, "cannot create probe directory");
        return InstallType::Unknown;
    }
    let probe = match tempfile::Builder::new().prefix("probe-").tempdir_in(temp_root) {
        Ok(dir) => dir,
        Err(e) => {
            warn!(path = %temp_root.display(), error = %e, "cannot create probe directory");
            return InstallType::Unknown;
        }
    };

    match extractor.extract(archive, probe.path(), ExtractBehavior::Direct).await {
        Ok(tree) => {
            let verdict = classify_tree(&tree);
            debug!(archive = %archive.display(), verdict = %verdict, "classified from probe extraction");
            verdict
        }
        Err(e) => {
            warn!(archive = %archive.display(), error = %e, "probe extraction failed");
            InstallType::Unknown
        }
    }
}

fn top_level_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

fn file_contains(path: &Path, needle: &[u8]) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; SCAN_CHUNK + needle.len()];
    let mut carried = 0usize;

    loop {
        let read = file.read(&mut buffer[carried..])?;
        if read == 0 {
            return Ok(false);
        }
        let filled = carried + read;
        if buffer[..filled].windows(needle.len()).any(|window| window == needle) {
            return Ok(true);
        }

        // Keep the tail so a marker split across reads is still found
        carried = filled.min(needle.len() - 1);
        buffer.copy_within(filled - carried..filled, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::extract::DirectoryExtractor;
    use tempfile::tempdir;

    fn touch(path: &Path, content: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn filename_tags_win_over_tree_contents() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("setup.exe"), b"MZ");

        assert_eq!(
            classify(Path::new("Game (Portable).zip"), Some(dir.path())),
            InstallType::Portable
        );
        assert_eq!(
            classify(Path::new("Game (INSTALLER).zip"), None),
            InstallType::Installer
        );
        assert_eq!(classify(Path::new("Game.zip"), None), InstallType::Unknown);
    }

    #[test]
    fn tree_with_setup_is_installer() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("Setup.exe"), b"MZ");
        touch(&dir.path().join("data.bin"), b"data");
        assert_eq!(classify(Path::new("Game.zip"), Some(dir.path())), InstallType::Installer);
    }

    #[test]
    fn tree_without_setup_is_portable() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("Game").join("game.exe"), b"MZ");
        assert_eq!(classify(Path::new("Game.zip"), Some(dir.path())), InstallType::Portable);
    }

    #[test]
    fn single_wrapper_folder_is_inspected() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("Game").join("setup.exe"), b"MZ");
        std::fs::create_dir_all(dir.path().join("DLC")).unwrap();

        assert_eq!(payload_root(dir.path()), dir.path().join("Game"));
        assert_eq!(classify_tree(dir.path()), InstallType::Installer);
    }

    #[test]
    fn signature_scan_finds_marker_across_chunks() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("installer.exe");
        let mut data = vec![0u8; SCAN_CHUNK - 4];
        data.extend_from_slice(b"Inno Setup Setup Data (6.2.0)");
        touch(&exe, &data);
        assert!(is_known_installer_signature(&exe));

        let plain = dir.path().join("plain.exe");
        touch(&plain, &vec![b'x'; SCAN_CHUNK * 2]);
        assert!(!is_known_installer_signature(&plain));
        assert!(!is_known_installer_signature(&dir.path().join("missing.exe")));
    }

    #[test]
    fn setup_binary_prefers_exact_name_then_signature() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("install_game.exe"), b"MZ..Inno Setup..");
        touch(&dir.path().join("unins000.exe"), b"MZ..Inno Setup..");
        assert_eq!(
            find_setup_binary(dir.path()),
            Some(dir.path().join("install_game.exe"))
        );

        touch(&dir.path().join("SETUP.exe"), b"MZ");
        assert_eq!(find_setup_binary(dir.path()), Some(dir.path().join("SETUP.exe")));
    }

    #[test]
    fn no_setup_binary_without_signature() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("game.exe"), b"MZ");
        assert_eq!(find_setup_binary(dir.path()), None);
    }

    #[test]
    fn recognized_requires_every_installer() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.exe");
        let b = dir.path().join("b.exe");
        touch(&a, b"Inno Setup");
        touch(&b, b"NSIS");
        assert!(all_recognized(&[a.clone()]));
        assert!(!all_recognized(&[a, b]));
        assert!(!all_recognized(&[]));
    }

    #[tokio::test]
    async fn fallback_extracts_when_name_is_inconclusive() {
        let downloads = tempdir().unwrap();
        let archive = downloads.path().join("Game");
        touch(&archive.join("setup.exe"), b"MZ");
        let temp_root = tempdir().unwrap();

        let verdict = classify_with_fallback(&archive, &DirectoryExtractor, temp_root.path()).await;
        assert_eq!(verdict, InstallType::Installer);
        assert!(crate::core::files::is_dir_empty(temp_root.path()).await);

        let tagged = downloads.path().join("Game (Portable)");
        touch(&tagged.join("setup.exe"), b"MZ");
        let verdict = classify_with_fallback(&tagged, &DirectoryExtractor, temp_root.path()).await;
        assert_eq!(verdict, InstallType::Portable);
    }
}
