//! Process-level exclusive lock on an artifacts directory.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::errors::StoreError;

pub const LOCK_FILE: &str = ".walkspec.lock";

/// Held for the lifetime of an orchestrator session. Released on drop.
#[derive(Debug)]
pub struct WorkspaceLock {
    file: File,
    path: PathBuf,
}

impl WorkspaceLock {
    /// Take the lock, failing immediately with [`StoreError::Locked`] if
    /// another process holds it.
    pub fn acquire(artifacts_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(artifacts_dir).map_err(|source| StoreError::Io {
            path: artifacts_dir.to_path_buf(),
            source,
        })?;

        let path = artifacts_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file, path }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(StoreError::Locked {
                path: artifacts_dir.to_path_buf(),
            }),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_creates_lock_file() {
        let dir = tempdir().unwrap();
        let lock = WorkspaceLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn test_second_acquire_is_refused_until_release() {
        let dir = tempdir().unwrap();
        let first = WorkspaceLock::acquire(dir.path()).unwrap();

        let err = WorkspaceLock::acquire(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Locked { .. }));

        drop(first);
        assert!(WorkspaceLock::acquire(dir.path()).is_ok());
    }
}
