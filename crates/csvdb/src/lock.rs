use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::{Result, StorageError};

/// Exclusive access to one dataset, released on drop.
///
/// File-backed datasets hold an advisory OS lock on `<dataset>.lock`;
/// in-memory datasets rely on `&mut` access and carry no file.
#[must_use = "the dataset is unlocked as soon as the guard is dropped"]
#[derive(Debug)]
pub struct WriteLock {
    file: Option<File>,
    path: Option<PathBuf>,
}

impl WriteLock {
    pub fn noop() -> Self {
        Self { file: None, path: None }
    }

    /// Blocks until the lock file can be locked exclusively.
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| StorageError::Lock { path: lock_path.to_path_buf(), source: e })?;

        FileExt::lock_exclusive(&file)
            .map_err(|e| StorageError::Lock { path: lock_path.to_path_buf(), source: e })?;

        tracing::trace!(path = %lock_path.display(), "dataset lock acquired");
        Ok(Self { file: Some(file), path: Some(lock_path.to_path_buf()) })
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!(
                    path = ?self.path,
                    error = %e,
                    "failed to release dataset lock"
                );
            }
        }
    }
}
