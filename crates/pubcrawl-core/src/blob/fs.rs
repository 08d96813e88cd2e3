use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use super::{content_sha, Blob, BlobStore};
use crate::error::StoreError;

/// Blobs as plain files under a root directory.
///
/// The hash check and the write are not atomic across processes; two
/// processes racing on the same file can still both pass the check.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open (and create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(path);
        let plain = !path.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StoreError::Backend(format!("invalid blob path: {path}")));
        }
        Ok(self.root.join(rel))
    }

    fn read(&self, file: &Path) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(file) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, file: &Path, content: &str) -> Result<String, StoreError> {
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = file.with_extension("tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, file)?;
        Ok(content_sha(content))
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        let file = self.resolve(path)?;
        Ok(self.read(&file)?.map(|content| Blob {
            sha: content_sha(&content),
            content,
        }))
    }

    fn create(&self, path: &str, message: &str, content: &str) -> Result<String, StoreError> {
        let file = self.resolve(path)?;
        if file.exists() {
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }
        tracing::debug!(path, message, "creating blob file");
        self.write(&file, content)
    }

    fn update(
        &self,
        path: &str,
        message: &str,
        content: &str,
        sha: &str,
    ) -> Result<String, StoreError> {
        let file = self.resolve(path)?;
        let current = self
            .read(&file)?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        if content_sha(&current) != sha {
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }
        tracing::debug!(path, message, "updating blob file");
        self.write(&file, content)
    }

    fn describe(&self) -> String {
        format!("files:{}", self.root.display())
    }
}
