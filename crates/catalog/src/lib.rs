pub mod inventory;
pub mod manifest;

pub use inventory::*;
pub use manifest::*;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("image root does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("unknown modality: {0}")]
    UnknownModality(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;
