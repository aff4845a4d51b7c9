//! Whole-file JSON persistence with atomic replacement.
//!
//! Files are written to a sibling `.tmp` path and renamed over the target, so
//! a reader never observes a partially written document.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::PersistenceError;

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_error(path: &Path, err: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Write {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Serialize `value` and atomically replace the file at `path`.
pub async fn write_json_atomic<T>(path: &Path, value: &T, pretty: bool) -> Result<(), PersistenceError>
where
    T: Serialize + ?Sized,
{
    let body = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    }
    .map_err(|e| write_error(path, e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| write_error(path, e))?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &body)
        .await
        .map_err(|e| write_error(path, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| write_error(path, e))?;
    Ok(())
}

/// Read and parse a JSON file. A missing file is `Ok(None)`.
pub async fn read_json<T>(path: &Path) -> Result<Option<T>, PersistenceError>
where
    T: DeserializeOwned,
{
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PersistenceError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            });
        }
    };

    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|e| PersistenceError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_creates_parent_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        write_json_atomic(&path, &vec![1, 2, 3], false).await.unwrap();

        let loaded: Option<Vec<u32>> = read_json(&path).await.unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let dir = tempdir().unwrap();
        let loaded: Option<Vec<u32>> = read_json(&dir.path().join("absent.json")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_read_corrupt_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let result: Result<Option<Vec<u32>>, _> = read_json(&path).await;
        assert!(matches!(result, Err(PersistenceError::Corrupt { .. })));
    }
}
