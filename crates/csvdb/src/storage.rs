//! Storage trait and implementations

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::{Result, StorageError, WriteLock};

pub trait Storage: Send + Sync {
    /// Whole dataset, or `None` if it was never written.
    fn read_all(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the whole dataset. Must be durable before returning `Ok`.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Exclusive read-modify-write window for this dataset.
    fn lock_exclusive(&self) -> Result<WriteLock>;

    /// Keep a copy of unreadable dataset bytes before they are replaced.
    /// Returns where the copy went, if anywhere.
    fn preserve_corrupt(&mut self, bytes: &[u8]) -> Result<Option<String>>;

    /// Human readable location, for logs and warnings.
    fn location(&self) -> String;
}

#[derive(Default)]
struct MemInner {
    data: Option<Vec<u8>>,
    corrupt: Option<Vec<u8>>,
    fail_writes: bool,
}

/// In-memory storage (for testing and demos)
///
/// Clones share the same dataset, so a test can keep one handle to inspect
/// bytes while the store owns the other.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<RwLock<MemInner>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let s = Self::new();
        if let Ok(mut inner) = s.inner.write() {
            inner.data = Some(bytes.into());
        }
        s
    }

    /// Current dataset bytes.
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.inner.read().ok().and_then(|inner| inner.data.clone())
    }

    /// Bytes handed to `preserve_corrupt`, if any.
    pub fn preserved(&self) -> Option<Vec<u8>> {
        self.inner.read().ok().and_then(|inner| inner.corrupt.clone())
    }

    /// Make every following `write_all` fail, to exercise error paths.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.write() {
            inner.fail_writes = fail;
        }
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("in-memory storage lock poisoned".to_string())
}

impl Storage for InMemoryStorage {
    fn read_all(&self) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.data.clone())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        if inner.fail_writes {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        inner.data = Some(bytes.to_vec());
        Ok(())
    }

    fn lock_exclusive(&self) -> Result<WriteLock> {
        Ok(WriteLock::noop())
    }

    fn preserve_corrupt(&mut self, bytes: &[u8]) -> Result<Option<String>> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        inner.corrupt = Some(bytes.to_vec());
        Ok(Some("memory:corrupt".to_string()))
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// One dataset per file. Writes go to a `.tmp` sibling which is synced and
/// renamed over the dataset, so readers see either the old or the new file.
#[derive(Clone, Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Creates the parent directory if needed; the file itself is created on
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    /// Where the first unreadable copy goes; later ones get `.1`, `.2`, ...
    pub fn corrupt_path(&self) -> PathBuf {
        self.sibling(".corrupt")
    }

    fn corrupt_path_numbered(&self, n: u32) -> PathBuf {
        match n {
            0 => self.corrupt_path(),
            n => self.sibling(&format!(".corrupt.{n}")),
        }
    }

    fn sync_parent(&self) -> Result<()> {
        #[cfg(unix)]
        {
            if let Some(parent) = self.path.parent() {
                let dir = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
                let handle = File::open(dir).map_err(|e| StorageError::io(dir, e))?;
                handle.sync_all().map_err(|e| StorageError::io(dir, e))?;
            }
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn read_all(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&self.path, e)),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let tmp = self.sibling(".tmp");
        let write_tmp = || -> std::io::Result<()> {
            let mut f = File::create(&tmp)?;
            f.write_all(bytes)?;
            f.sync_all()
        };
        if let Err(e) = write_tmp() {
            let _ = fs::remove_file(&tmp);
            return Err(StorageError::io(&tmp, e));
        }

        fs::rename(&tmp, &self.path).map_err(|e| StorageError::io(&self.path, e))?;
        self.sync_parent()?;

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "dataset written");
        Ok(())
    }

    fn lock_exclusive(&self) -> Result<WriteLock> {
        WriteLock::acquire(&self.lock_path())
    }

    /// Never replaces an earlier copy.
    fn preserve_corrupt(&mut self, bytes: &[u8]) -> Result<Option<String>> {
        for n in 0.. {
            let target = self.corrupt_path_numbered(n);
            let mut f = match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::io(&target, e)),
            };
            f.write_all(bytes)
                .and_then(|_| f.sync_all())
                .map_err(|e| StorageError::io(&target, e))?;
            return Ok(Some(target.display().to_string()));
        }
        Ok(None)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
