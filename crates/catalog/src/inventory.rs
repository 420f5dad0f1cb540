use std::fs;
use std::path::{Component, Path, PathBuf};

use ratings::Item;

use crate::{CatalogError, Result};

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
pub const EXTRA_IMAGE_EXTENSIONS: [&str; 3] = ["bmp", "tiff", "tif"];

/// Where the items of a modality come from.
pub trait ItemSource: Send + Sync {
    /// Modalities that have at least one image.
    fn modalities(&self) -> Result<Vec<String>>;

    /// Items of one modality, ordered by method then file name.
    fn list_items(&self, modality: &str) -> Result<Vec<Item>>;
}

/// `root/<modality>/<method>/<image>` on local disk.
#[derive(Clone, Debug)]
pub struct DirectoryCatalog {
    root: PathBuf,
    extensions: Vec<&'static str>,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>, extra_formats: bool) -> Self {
        let mut extensions = IMAGE_EXTENSIONS.to_vec();
        if extra_formats {
            extensions.extend(EXTRA_IMAGE_EXTENSIONS);
        }
        Self { root: root.into(), extensions }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|x| *x == e))
    }

    /// Readable, non-empty image with an accepted extension.
    fn is_image(&self, path: &Path) -> bool {
        if !self.accepts(path) {
            return false;
        }
        match fs::metadata(path) {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                false
            }
        }
    }

    fn contains_image(&self, dir: &Path) -> bool {
        let Ok(entries) = sorted_entries(dir) else { return false };
        entries.iter().any(|p| {
            if p.is_dir() {
                self.contains_image(p)
            } else {
                self.is_image(p)
            }
        })
    }

    fn modality_dir(&self, modality: &str) -> Result<PathBuf> {
        let mut parts = Path::new(modality).components();
        let single = matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None));
        let dir = self.root.join(modality);
        if !single || !dir.is_dir() {
            return Err(CatalogError::UnknownModality(modality.to_string()));
        }
        Ok(dir)
    }
}

impl ItemSource for DirectoryCatalog {
    fn modalities(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(CatalogError::RootMissing(self.root.clone()));
        }

        let mut out = Vec::new();
        for path in sorted_entries(&self.root)? {
            if !path.is_dir() || !self.contains_image(&path) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                out.push(name.to_string());
            }
        }
        Ok(out)
    }

    fn list_items(&self, modality: &str) -> Result<Vec<Item>> {
        let modality_dir = self.modality_dir(modality)?;

        let mut items = Vec::new();
        for method_dir in sorted_entries(&modality_dir)? {
            if !method_dir.is_dir() {
                continue;
            }
            let Some(method) = method_dir.file_name().and_then(|n| n.to_str()) else { continue };

            for file in sorted_entries(&method_dir)? {
                if !self.is_image(&file) {
                    continue;
                }
                let Some(filename) = file.file_name().and_then(|n| n.to_str()) else { continue };
                items.push(Item {
                    modality: modality.to_string(),
                    method: method.to_string(),
                    filename: filename.to_string(),
                    source_location: file.clone(),
                });
            }
        }

        tracing::debug!(modality, items = items.len(), "listed items");
        Ok(items)
    }
}

/// Directory entries sorted by file name.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let io = |e| CatalogError::Io { path: dir.to_path_buf(), source: e };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        paths.push(entry.map_err(io)?.path());
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}
