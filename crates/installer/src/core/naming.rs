//! Name conventions shared by the classifier, resolver and orchestrator

use std::path::Path;

use crate::core::ContentKind;

/// Characters Windows refuses in file and folder names
const INVALID_NAME_CHARS: &[char] = &['<', '>', '"', '/', '\\', '|', '?', '*'];

/// Filename tags that force a classification regardless of archive contents
pub const INSTALLER_TAG: &str = "(installer)";
pub const PORTABLE_TAG: &str = "(portable)";

/// Turn a display title into a folder name that is safe on every file system
///
/// Colons become `" -"`, other reserved characters and control characters are
/// dropped, runs of whitespace collapse, and trailing dots and spaces are
/// trimmed. An empty result falls back to `"Game"`.
pub fn sanitize_folder_name(title: &str) -> String {
    let mut replaced = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            ':' => replaced.push_str(" -"),
            c if INVALID_NAME_CHARS.contains(&c) || c.is_control() => {}
            c => replaced.push(c),
        }
    }

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches(['.', ' ']).trim();

    if trimmed.is_empty() {
        "Game".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Derive a display title from an archive file name
///
/// `"Some Game (Portable).zip"` becomes `"Some Game"`.
pub fn title_from_archive(archive: &Path) -> String {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut title = stem.clone();
    for tag in [INSTALLER_TAG, PORTABLE_TAG] {
        if let Some(idx) = title.to_ascii_lowercase().find(tag) {
            title.replace_range(idx..idx + tag.len(), "");
        }
    }

    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() { stem } else { title }
}

/// Whether a path has a Windows executable extension (case-insensitive)
pub fn is_executable(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("exe"))
        .unwrap_or(false)
}

/// Whether a file name follows the uninstaller naming convention
pub fn is_uninstaller(path: &Path) -> bool {
    let name = file_name_lower(path);
    name.contains("uninstall") || name.contains("unins")
}

/// Whether a file name mentions "setup"
pub fn is_setup_named(path: &Path) -> bool {
    file_name_lower(path).contains("setup")
}

/// Whether a file is exactly `setup.exe` (case-insensitive)
pub fn is_exact_setup(path: &Path) -> bool {
    file_name_lower(path) == "setup.exe"
}

/// Map a top-level folder name to the optional-content kind it reserves
pub fn reserved_content_kind(name: &str) -> Option<ContentKind> {
    ContentKind::ALL
        .into_iter()
        .find(|kind| name.eq_ignore_ascii_case(kind.folder_name()))
}

/// Whether a folder name is one of the reserved optional-content names
pub fn is_reserved_folder(name: &str) -> bool {
    reserved_content_kind(name).is_some()
}

/// Case-insensitive comparison of two folder names after sanitizing both
pub fn same_folder_name(a: &str, b: &str) -> bool {
    sanitize_folder_name(a).eq_ignore_ascii_case(&sanitize_folder_name(b))
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn sanitize_strips_reserved_characters() {
        assert_eq!(sanitize_folder_name("Half-Life: Source"), "Half-Life - Source");
        assert_eq!(sanitize_folder_name("What? <Game>*"), "What Game");
        assert_eq!(sanitize_folder_name("Trailing..."), "Trailing");
        assert_eq!(sanitize_folder_name("  "), "Game");
    }

    #[test]
    fn title_drops_classification_tags() {
        assert_eq!(title_from_archive(Path::new("/dl/Game (Portable).zip")), "Game");
        assert_eq!(
            title_from_archive(Path::new("Big Title (INSTALLER).7z")),
            "Big Title"
        );
        assert_eq!(title_from_archive(Path::new("Plain.rar")), "Plain");
    }

    #[test]
    fn executable_and_uninstaller_detection() {
        assert!(is_executable(&PathBuf::from("GAME.EXE")));
        assert!(!is_executable(&PathBuf::from("readme.txt")));
        assert!(is_uninstaller(&PathBuf::from("unins000.exe")));
        assert!(is_uninstaller(&PathBuf::from("Uninstall Game.exe")));
        assert!(!is_uninstaller(&PathBuf::from("game.exe")));
        assert!(is_exact_setup(&PathBuf::from("Setup.EXE")));
        assert!(!is_exact_setup(&PathBuf::from("setup_game.exe")));
        assert!(is_setup_named(&PathBuf::from("setup_game.exe")));
    }

    #[test]
    fn reserved_names_are_case_insensitive() {
        assert_eq!(reserved_content_kind("DLC"), Some(ContentKind::Dlc));
        assert_eq!(reserved_content_kind("Pre-Reqs"), Some(ContentKind::PreReqs));
        assert_eq!(reserved_content_kind("ost"), Some(ContentKind::Ost));
        assert!(!is_reserved_folder("Game"));
    }
}
