//! Small filesystem helpers shared by the project, job and classifier code.
//!
//! Every file this crate produces is written exactly once, through
//! [`write_atomic`] or [`write_atomic_new`], so the external worker never
//! observes a half-written record.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{Result, SpiceError};

/// Write `content` to a hidden temp file inside `staging_dir` and rename it
/// onto `target`. `staging_dir` must be on the same filesystem as `target`
/// and must not be a directory the worker polls.
pub async fn write_atomic(target: &Path, staging_dir: &Path, content: &str) -> Result<()> {
    let temp_path = temp_path_for(target, staging_dir);

    if let Err(e) = tokio::fs::write(&temp_path, content).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(SpiceError::io(&temp_path, e));
    }

    if let Err(e) = tokio::fs::rename(&temp_path, target).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(SpiceError::io(target, e));
    }
    Ok(())
}

/// Like [`write_atomic`], but fails with `AlreadyExists` instead of
/// replacing an existing `target`. The temp file is published with a hard
/// link, which refuses to overwrite, and then removed.
pub async fn write_atomic_new(target: &Path, staging_dir: &Path, content: &str) -> Result<()> {
    let temp_path = temp_path_for(target, staging_dir);

    if let Err(e) = tokio::fs::write(&temp_path, content).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(SpiceError::io(&temp_path, e));
    }

    let linked = tokio::fs::hard_link(&temp_path, target).await;
    let _ = tokio::fs::remove_file(&temp_path).await;
    match linked {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(SpiceError::AlreadyExists(target.display().to_string()))
        }
        Err(e) => Err(SpiceError::io(target, e)),
    }
}

fn temp_path_for(target: &Path, staging_dir: &Path) -> PathBuf {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("record");
    staging_dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}

/// Read a file, returning `None` instead of an error when it does not exist.
pub async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SpiceError::io(path, e)),
    }
}

/// Non-hidden entries of `dir` with their file-type flag, in name order.
///
/// Entries that vanish between listing and stat are dropped. A missing
/// directory is reported as `NotFound`.
pub async fn list_entries(dir: &Path) -> Result<Vec<(PathBuf, bool)>> {
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| SpiceError::io(dir, e))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| SpiceError::io(dir, e))?
    {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        match entry.file_type().await {
            Ok(file_type) => entries.push((entry.path(), file_type.is_dir())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(SpiceError::io(entry.path(), e)),
        }
    }
    entries.sort();
    Ok(entries)
}

/// Child directories of `dir`.
pub async fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_entries(dir)
        .await?
        .into_iter()
        .filter_map(|(path, is_dir)| is_dir.then_some(path))
        .collect())
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("record.txt");

        write_atomic(&target, dir.path(), "a\nb\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "a\nb\n");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn write_atomic_into_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("missing").join("record.txt");

        let err = write_atomic(&target, dir.path(), "x").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn write_atomic_new_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("record.txt");
        std::fs::write(&target, "first\n").unwrap();

        let err = write_atomic_new(&target, dir.path(), "second\n")
            .await
            .unwrap_err();
        assert!(matches!(err, SpiceError::AlreadyExists(_)));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "first\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let fresh = dir.path().join("fresh.txt");
        write_atomic_new(&fresh, dir.path(), "x").await.unwrap();
        assert_eq!(std::fs::read_to_string(&fresh).unwrap(), "x");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn read_optional_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let value = read_optional(&dir.path().join("nope")).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn list_entries_skips_hidden_and_sorts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b"), "").unwrap();
        std::fs::write(dir.path().join(".hidden"), "").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();

        let entries = list_entries(dir.path()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(file_name(&entries[0].0), "a");
        assert!(entries[0].1);
        assert_eq!(file_name(&entries[1].0), "b");
        assert!(!entries[1].1);

        let dirs = list_dirs(dir.path()).await.unwrap();
        assert_eq!(dirs, vec![dir.path().join("a")]);
    }

    #[tokio::test]
    async fn list_entries_missing_dir_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = list_entries(&dir.path().join("gone")).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
