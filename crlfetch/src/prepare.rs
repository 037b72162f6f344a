//! Environment preparation before the download.
//!
//! Ensures the destination and working directories exist and removes any
//! archive left behind by an interrupted run, so the fetcher always writes a
//! fresh file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::status::PathStatus;

/// Fatal environment setup failures.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A path that must be a directory is something else.
    #[error("{} exists but is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// A stale archive from a previous run could not be removed.
    #[error("failed to remove stale archive {}: {source}", path.display())]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Directory statuses after a successful preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prepared {
    pub crl_path: PathStatus,
    pub temp_path: PathStatus,
    /// Whether an archive from an earlier run was deleted.
    pub removed_stale: bool,
}

/// Partial progress when preparation fails.
#[derive(Debug)]
pub struct PrepareFailure {
    pub crl_path: PathStatus,
    pub temp_path: PathStatus,
    pub error: SetupError,
}

/// Create `destination` and `working` when missing and delete a stale
/// `working/archive_name`.
///
/// Both directories are reported `Good` whether they already existed or were
/// just created.
pub fn prepare(
    destination: &Path,
    working: &Path,
    archive_name: &str,
) -> Result<Prepared, PrepareFailure> {
    let mut crl_path = PathStatus::Unknown;
    let mut temp_path = PathStatus::Unknown;

    let fail = |crl_path, temp_path, error| PrepareFailure {
        crl_path,
        temp_path,
        error,
    };

    if let Err(e) = ensure_dir(destination) {
        return Err(fail(crl_path, temp_path, e));
    }
    crl_path = PathStatus::Good;

    if let Err(e) = ensure_dir(working) {
        return Err(fail(crl_path, temp_path, e));
    }
    temp_path = PathStatus::Good;

    let stale = working.join(archive_name);
    let removed_stale = match remove_stale(&stale) {
        Ok(removed) => removed,
        Err(e) => return Err(fail(crl_path, temp_path, e)),
    };

    Ok(Prepared {
        crl_path,
        temp_path,
        removed_stale,
    })
}

fn ensure_dir(path: &Path) -> Result<(), SetupError> {
    if path.is_dir() {
        tracing::debug!(path = %path.display(), "Directory exists");
        return Ok(());
    }
    if path.exists() {
        return Err(SetupError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    fs::create_dir_all(path).map_err(|e| SetupError::CreateDir {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), "Created directory");
    Ok(())
}

fn remove_stale(archive: &Path) -> Result<bool, SetupError> {
    match fs::remove_file(archive) {
        Ok(()) => {
            tracing::info!(path = %archive.display(), "Removed stale archive from previous run");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SetupError::RemoveStale {
            path: archive.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_missing_directories() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("www").join("crl");
        let working = temp.path().join("scratch").join("a").join("b");

        let prepared = prepare(&destination, &working, "ALLCRLZIP.zip").unwrap();

        assert!(destination.is_dir());
        assert!(working.is_dir());
        assert_eq!(prepared.crl_path, PathStatus::Good);
        assert_eq!(prepared.temp_path, PathStatus::Good);
        assert!(!prepared.removed_stale);
    }

    #[test]
    fn test_existing_directories_are_good() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("crl");
        fs::create_dir(&destination).unwrap();
        fs::write(destination.join("keep.crl"), b"existing").unwrap();

        let prepared = prepare(&destination, temp.path(), "ALLCRLZIP.zip").unwrap();

        assert_eq!(prepared.crl_path, PathStatus::Good);
        assert_eq!(prepared.temp_path, PathStatus::Good);
        assert!(destination.join("keep.crl").exists());
    }

    #[test]
    fn test_removes_stale_archive() {
        let temp = TempDir::new().unwrap();
        let stale = temp.path().join("ALLCRLZIP.zip");
        fs::write(&stale, b"partial download").unwrap();

        let prepared = prepare(&temp.path().join("crl"), temp.path(), "ALLCRLZIP.zip").unwrap();

        assert!(prepared.removed_stale);
        assert!(!stale.exists());
    }

    #[test]
    fn test_destination_is_a_file() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("crl");
        fs::write(&destination, b"not a directory").unwrap();

        let failure = prepare(&destination, temp.path(), "ALLCRLZIP.zip").unwrap_err();

        assert!(matches!(failure.error, SetupError::NotADirectory { .. }));
        assert_eq!(failure.crl_path, PathStatus::Unknown);
        assert_eq!(failure.temp_path, PathStatus::Unknown);
    }

    #[test]
    fn test_working_failure_keeps_destination_status() {
        let temp = TempDir::new().unwrap();
        let working = temp.path().join("scratch");
        fs::write(&working, b"in the way").unwrap();

        let failure = prepare(&temp.path().join("crl"), &working, "ALLCRLZIP.zip").unwrap_err();

        assert_eq!(failure.crl_path, PathStatus::Good);
        assert_eq!(failure.temp_path, PathStatus::Unknown);
    }
}
