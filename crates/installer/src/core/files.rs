//! File operation utilities
//!
//! Centralized tree and file relocation between the private staging area and
//! library directories. Moves are renames when source and destination share a
//! volume and copy-then-delete otherwise. Bulk copies log and skip entries that
//! fail so that a single unreadable file does not sink the whole install.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::core::error::{FileOperation, InstallError, Result};

/// Summary of a bulk copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub files_copied: usize,
    pub failures: usize,
}

/// Move a directory tree to `destination`, replacing whatever is there
///
/// Returns the path the content now lives at. When `source` and `destination`
/// are the same path nothing happens and `destination` is returned. When
/// `destination` lies inside `source` the tree cannot be moved into itself, so
/// nothing happens and `source` is returned. When `source` lies inside
/// `destination` it is parked beside the destination before the destination
/// is cleared.
pub async fn relocate_tree(source: &Path, destination: &Path) -> Result<PathBuf> {
    let src = normalize_path(source);
    let dst = normalize_path(destination);

    if paths_equal(&src, &dst) {
        debug!(path = %source.display(), "relocate_tree: source and destination are identical");
        return Ok(destination.to_path_buf());
    }
    if dst.starts_with(&src) {
        debug!(
            source = %source.display(),
            destination = %destination.display(),
            "relocate_tree: destination is inside source, leaving tree in place"
        );
        return Ok(source.to_path_buf());
    }

    fs::metadata(source)
        .await
        .map_err(|e| InstallError::fs(source, FileOperation::Metadata, e))?;

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| InstallError::fs(parent, FileOperation::CreateDir, e))?;
    }

    let mut holder = None;
    let mut source = source.to_path_buf();
    if src.starts_with(&dst) {
        let (parked_in, parked) = park_beside(&source, destination).await?;
        holder = Some(parked_in);
        source = parked;
    }

    remove_existing(destination).await?;

    match fs::rename(&source, destination).await {
        Ok(()) => {
            debug!(source = %source.display(), destination = %destination.display(), "moved tree");
        }
        Err(e) => {
            debug!(
                source = %source.display(),
                destination = %destination.display(),
                error = %e,
                "rename failed, falling back to copy and delete"
            );
            let report = copy_tree(&source, destination).await?;
            if report.failures > 0 {
                warn!(
                    source = %source.display(),
                    failures = report.failures,
                    "some entries could not be copied; source left in place"
                );
                if let Some(parked_in) = holder.take() {
                    let kept = parked_in.keep();
                    warn!(path = %kept.display(), "parked source kept for recovery");
                }
            } else if let Err(e) = fs::remove_dir_all(&source).await {
                warn!(path = %source.display(), error = %e, "failed to remove source after copy");
            }
        }
    }

    Ok(destination.to_path_buf())
}

/// Move `source` out of the way into a fresh directory next to `destination`
async fn park_beside(source: &Path, destination: &Path) -> Result<(tempfile::TempDir, PathBuf)> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let holder = tempfile::Builder::new()
        .prefix(".relocate-")
        .tempdir_in(parent)
        .map_err(|e| InstallError::fs(parent, FileOperation::CreateDir, e))?;

    let parked = holder.path().join("content");
    fs::rename(source, &parked)
        .await
        .map_err(|e| InstallError::fs(source, FileOperation::Move, e))?;

    debug!(source = %source.display(), parked = %parked.display(), "parked nested tree before replacing its parent");
    Ok((holder, parked))
}

/// Move a single file into `destination_dir`, replacing any file with the same name
pub async fn relocate_file(source: &Path, destination_dir: &Path) -> Result<PathBuf> {
    let file_name = source.file_name().ok_or_else(|| {
        InstallError::fs(
            source,
            FileOperation::Move,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let target = destination_dir.join(file_name);

    if paths_equal(&normalize_path(source), &normalize_path(&target)) {
        return Ok(target);
    }

    fs::create_dir_all(destination_dir)
        .await
        .map_err(|e| InstallError::fs(destination_dir, FileOperation::CreateDir, e))?;
    remove_existing(&target).await?;

    if fs::rename(source, &target).await.is_err() {
        fs::copy(source, &target)
            .await
            .map_err(|e| InstallError::fs(source, FileOperation::Copy, e))?;
        fs::remove_file(source)
            .await
            .map_err(|e| InstallError::fs(source, FileOperation::Delete, e))?;
    }

    debug!(source = %source.display(), destination = %target.display(), "moved file");
    Ok(target)
}

/// Copy the contents of `source` into `destination`, merging with existing files
///
/// Existing files are overwritten. Individual failures are logged and counted
/// rather than aborting the copy. Failing to read `source` itself is an error.
pub async fn copy_tree(source: &Path, destination: &Path) -> Result<CopyReport> {
    let mut report = CopyReport::default();
    let mut pending = vec![(source.to_path_buf(), destination.to_path_buf())];
    let mut is_root = true;

    while let Some((from_dir, to_dir)) = pending.pop() {
        if let Err(e) = fs::create_dir_all(&to_dir).await {
            warn!(path = %to_dir.display(), error = %e, "skipping directory that could not be created");
            report.failures += 1;
            continue;
        }

        let mut entries = match fs::read_dir(&from_dir).await {
            Ok(entries) => entries,
            Err(e) if is_root => return Err(InstallError::fs(&from_dir, FileOperation::ListDir, e)),
            Err(e) => {
                warn!(path = %from_dir.display(), error = %e, "skipping unreadable directory");
                report.failures += 1;
                continue;
            }
        };
        is_root = false;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %from_dir.display(), error = %e, "directory listing interrupted");
                    report.failures += 1;
                    break;
                }
            };

            let from = entry.path();
            let to = to_dir.join(entry.file_name());
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);

            if is_dir {
                pending.push((from, to));
                continue;
            }

            match fs::copy(&from, &to).await {
                Ok(_) => report.files_copied += 1,
                Err(e) => {
                    warn!(source = %from.display(), destination = %to.display(), error = %e, "failed to copy file");
                    report.failures += 1;
                }
            }
        }
    }

    debug!(
        source = %source.display(),
        destination = %destination.display(),
        files = report.files_copied,
        failures = report.failures,
        "copied tree"
    );
    Ok(report)
}

/// Whether a directory is missing or has no entries
pub async fn is_dir_empty(path: &Path) -> bool {
    match fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => true,
    }
}

/// List the direct children of a directory, sorted by path
pub async fn list_dir(path: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(path)
        .await
        .map_err(|e| InstallError::fs(path, FileOperation::ListDir, e))?;

    let mut children = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| InstallError::fs(path, FileOperation::ListDir, e))?
    {
        children.push(entry.path());
    }
    children.sort();
    Ok(children)
}

/// Remove a tree, logging instead of failing
pub async fn remove_tree_best_effort(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove directory");
        }
    }
}

/// Whether `path` is `ancestor` or lies beneath it
pub fn is_within(path: &Path, ancestor: &Path) -> bool {
    let path = normalize_path(path);
    let ancestor = normalize_path(ancestor);
    if cfg!(windows) {
        let path = path.to_string_lossy().to_lowercase();
        let ancestor = ancestor.to_string_lossy().to_lowercase();
        Path::new(&path).starts_with(Path::new(&ancestor))
    } else {
        path.starts_with(&ancestor)
    }
}

/// Resolve a path as far as the file system allows, lexically for the rest
///
/// The longest existing ancestor is canonicalized and the remaining components
/// are appended after removing `.` and `..` lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    let lexical = lexical_normalize(path);

    let mut existing = lexical.as_path();
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            let mut result = canonical;
            for part in tail.iter().rev() {
                result.push(part);
            }
            return result;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => return lexical,
        }
    }
}

/// Remove `.` and `..` components without touching the file system
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn paths_equal(a: &Path, b: &Path) -> bool {
    if cfg!(windows) {
        a.to_string_lossy().eq_ignore_ascii_case(&b.to_string_lossy())
    } else {
        a == b
    }
}

async fn remove_existing(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)
            .await
            .map_err(|e| InstallError::fs(path, FileOperation::Delete, e)),
        Ok(_) => fs::remove_file(path)
            .await
            .map_err(|e| InstallError::fs(path, FileOperation::Delete, e)),
        Err(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(path, content).await.unwrap();
    }

    #[tokio::test]
    async fn relocate_tree_to_itself_is_noop() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("Game");
        write(&tree.join("game.exe"), b"MZ").await;

        let result = relocate_tree(&tree, &tree).await.unwrap();
        assert_eq!(result, tree);
        assert!(tree.join("game.exe").exists());
    }

    #[tokio::test]
    async fn relocate_tree_into_own_descendant_is_noop() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("Game");
        write(&tree.join("game.exe"), b"MZ").await;

        let result = relocate_tree(&tree, &tree.join("nested")).await.unwrap();
        assert_eq!(result, tree);
        assert!(tree.join("game.exe").exists());
        assert!(!tree.join("nested").exists());
    }

    #[tokio::test]
    async fn relocate_tree_onto_own_parent_keeps_payload() {
        let dir = tempdir().unwrap();
        let outer = dir.path().join("Game");
        let inner = outer.join("Game");
        write(&inner.join("game.exe"), b"payload").await;
        write(&outer.join("leftover.txt"), b"stale").await;

        let result = relocate_tree(&inner, &outer).await.unwrap();
        assert_eq!(result, outer);
        assert_eq!(fs::read(outer.join("game.exe")).await.unwrap(), b"payload");
        assert!(!outer.join("leftover.txt").exists());
        assert!(!outer.join("Game").exists());

        let siblings = list_dir(dir.path()).await.unwrap();
        assert_eq!(siblings, vec![outer]);
    }

    #[tokio::test]
    async fn relocate_tree_moves_content() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("stage").join("Game");
        let destination = dir.path().join("library").join("Game");
        write(&source.join("bin").join("game.exe"), b"payload bytes").await;

        let result = relocate_tree(&source, &destination).await.unwrap();
        assert_eq!(result, destination);
        assert!(!source.exists());
        let moved = fs::read(destination.join("bin").join("game.exe")).await.unwrap();
        assert_eq!(moved, b"payload bytes");
    }

    #[tokio::test]
    async fn relocate_tree_replaces_existing_destination() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("new");
        let destination = dir.path().join("old");
        write(&source.join("fresh.txt"), b"fresh").await;
        write(&destination.join("stale.txt"), b"stale").await;

        relocate_tree(&source, &destination).await.unwrap();
        assert!(destination.join("fresh.txt").exists());
        assert!(!destination.join("stale.txt").exists());
    }

    #[tokio::test]
    async fn relocate_missing_source_is_error() {
        let dir = tempdir().unwrap();
        let err = relocate_tree(&dir.path().join("missing"), &dir.path().join("dst"))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::FileSystem { .. }));
    }

    #[tokio::test]
    async fn relocate_file_moves_into_directory() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a").join("readme.txt");
        write(&source, b"hello").await;
        write(&dir.path().join("b").join("readme.txt"), b"old").await;

        let moved = relocate_file(&source, &dir.path().join("b")).await.unwrap();
        assert_eq!(moved, dir.path().join("b").join("readme.txt"));
        assert!(!source.exists());
        assert_eq!(fs::read(&moved).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn copy_tree_merges_and_keeps_source() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("OST");
        let destination = dir.path().join("Music");
        write(&source.join("01.flac"), b"one").await;
        write(&source.join("disc2").join("02.flac"), b"two").await;
        write(&destination.join("existing.txt"), b"keep").await;

        let report = copy_tree(&source, &destination).await.unwrap();
        assert_eq!(report, CopyReport { files_copied: 2, failures: 0 });
        assert!(source.join("01.flac").exists());
        assert!(destination.join("existing.txt").exists());
        assert_eq!(fs::read(destination.join("disc2").join("02.flac")).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn empty_directory_checks() {
        let dir = tempdir().unwrap();
        assert!(is_dir_empty(dir.path()).await);
        assert!(is_dir_empty(&dir.path().join("missing")).await);
        write(&dir.path().join("file"), b"x").await;
        assert!(!is_dir_empty(dir.path()).await);
    }

    #[test]
    fn lexical_normalization() {
        assert_eq!(
            lexical_normalize(Path::new("/games/./Game/../Other/bin")),
            PathBuf::from("/games/Other/bin")
        );
    }

    #[test]
    fn within_checks_descendants() {
        let dir = tempdir().unwrap();
        assert!(is_within(&dir.path().join("a").join("b"), dir.path()));
        assert!(is_within(dir.path(), dir.path()));
        assert!(!is_within(Path::new("/elsewhere"), dir.path()));
    }
}
