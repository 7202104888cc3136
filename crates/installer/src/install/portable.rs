//! Portable payload normalization
//!
//! Portable archives are laid out inconsistently. The game folder is picked
//! out of the extracted tree and moved to `<install_dir>/<title>`:
//!
//! 1. a folder named like the title wins, with same-named nesting flattened
//! 2. loose files at the top are gathered into a fresh title folder
//! 3. otherwise the first non-reserved folder is taken

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::core::error::{FileOperation, InstallError, Result};
use crate::core::{files, naming};

/// Move the game payload of `extracted` into `install_dir/folder_name`
///
/// Reserved content folders are left where they are. Returns the game
/// directory.
pub async fn normalize_portable(extracted: &Path, install_dir: &Path, folder_name: &str) -> Result<PathBuf> {
    let target = install_dir.join(folder_name);
    let entries = files::list_dir(extracted).await?;

    let mut folders = Vec::new();
    let mut loose = Vec::new();
    for entry in entries {
        let name = file_name(&entry);
        if entry.is_dir() {
            if !naming::is_reserved_folder(&name) {
                folders.push(entry);
            }
        } else {
            loose.push(entry);
        }
    }

    if let Some(named) = folders.iter().find(|f| naming::same_folder_name(&file_name(f), folder_name)) {
        let source = flatten_same_named(named, folder_name).await;
        info!(source = %source.display(), target = %target.display(), "moving title folder");
        return files::relocate_tree(&source, &target).await;
    }

    if !loose.is_empty() {
        info!(
            files = loose.len(),
            folders = folders.len(),
            target = %target.display(),
            "gathering loose payload into title folder"
        );
        return gather(&loose, &folders, &target).await;
    }

    match folders.first() {
        Some(first) => {
            let source = flatten_same_named(first, &file_name(first)).await;
            info!(source = %source.display(), target = %target.display(), "moving first payload folder");
            files::relocate_tree(&source, &target).await
        }
        None => Err(InstallError::ContentNotFound(extracted.to_path_buf())),
    }
}

/// Descend through `Game/Game/...` chains where each level holds only the next
async fn flatten_same_named(folder: &Path, name: &str) -> PathBuf {
    let mut current = folder.to_path_buf();
    loop {
        let Ok(children) = files::list_dir(&current).await else {
            return current;
        };
        match children.as_slice() {
            [only] if only.is_dir() && naming::same_folder_name(&file_name(only), name) => {
                debug!(path = %only.display(), "flattening nested title folder");
                current = only.clone();
            }
            _ => return current,
        }
    }
}

async fn gather(loose: &[PathBuf], folders: &[PathBuf], target: &Path) -> Result<PathBuf> {
    if fs::metadata(target).await.is_ok() {
        fs::remove_dir_all(target)
            .await
            .map_err(|e| InstallError::fs(target, FileOperation::Delete, e))?;
    }
    fs::create_dir_all(target)
        .await
        .map_err(|e| InstallError::fs(target, FileOperation::CreateDir, e))?;

    for file in loose {
        files::relocate_file(file, target).await?;
    }
    for folder in folders {
        files::relocate_tree(folder, &target.join(file_name(folder))).await?;
    }
    Ok(target.to_path_buf())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(path, b"MZ").await.unwrap();
    }

    #[tokio::test]
    async fn title_folder_is_moved_and_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let extracted = dir.path().join("extracted");
        let install = dir.path().join("library");
        touch(&extracted.join("Game").join("Game").join("game.exe")).await;
        touch(&extracted.join("Other").join("readme.exe")).await;
        touch(&extracted.join("OST").join("track.mp3")).await;

        let game_dir = normalize_portable(&extracted, &install, "Game").await.unwrap();

        assert_eq!(game_dir, install.join("Game"));
        assert!(game_dir.join("game.exe").is_file());
        assert!(!game_dir.join("Game").exists());
        assert!(extracted.join("OST").join("track.mp3").is_file());
    }

    #[tokio::test]
    async fn loose_files_are_gathered_without_reserved_folders() {
        let dir = tempfile::tempdir().unwrap();
        let extracted = dir.path().join("extracted");
        let install = dir.path().join("library");
        touch(&extracted.join("game.exe")).await;
        touch(&extracted.join("data").join("pak0.pak")).await;
        touch(&extracted.join("Bonus").join("artbook.pdf")).await;

        let game_dir = normalize_portable(&extracted, &install, "Some Game").await.unwrap();

        assert_eq!(game_dir, install.join("Some Game"));
        assert!(game_dir.join("game.exe").is_file());
        assert!(game_dir.join("data").join("pak0.pak").is_file());
        assert!(!game_dir.join("Bonus").exists());
        assert!(extracted.join("Bonus").join("artbook.pdf").is_file());
    }

    #[tokio::test]
    async fn first_folder_is_used_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        let extracted = dir.path().join("extracted");
        let install = dir.path().join("library");
        touch(&extracted.join("b-folder").join("b.exe")).await;
        touch(&extracted.join("a-folder").join("a.exe")).await;

        let game_dir = normalize_portable(&extracted, &install, "Title").await.unwrap();

        assert!(game_dir.join("a.exe").is_file());
        assert!(extracted.join("b-folder").join("b.exe").is_file());
    }

    #[tokio::test]
    async fn only_reserved_content_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let extracted = dir.path().join("extracted");
        touch(&extracted.join("DLC").join("dlc.exe")).await;

        let err = normalize_portable(&extracted, &dir.path().join("library"), "Title")
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::ContentNotFound(_)));
        assert!(err.is_reported());
    }
}
