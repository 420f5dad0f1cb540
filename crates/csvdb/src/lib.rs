//! Durable dataset storage
//!
//! A dataset is one opaque byte blob (a CSV file in practice). Backends only
//! promise two things: a successful `write_all` is durable before it returns,
//! and `lock_exclusive` gives the caller a read-modify-write window that no
//! other writer of the same dataset can interleave with.

mod lock;
mod storage;

pub use lock::WriteLock;
pub use storage::{FileStorage, InMemoryStorage, Storage};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io { path: path.into(), source }
    }
}
