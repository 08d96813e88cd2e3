use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{content_sha, Blob, BlobStore};
use crate::error::StoreError;

/// In-process blob store. Clones share the same blobs.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Blob>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Blob>>, StoreError> {
        self.blobs
            .lock()
            .map_err(|_| StoreError::Backend("memory blob store poisoned".to_string()))
    }

    /// Overwrite a blob without any hash check, as a concurrent writer would.
    pub fn put(&self, path: &str, content: &str) -> Result<String, StoreError> {
        let sha = content_sha(content);
        self.lock()?.insert(
            path.to_string(),
            Blob {
                content: content.to_string(),
                sha: sha.clone(),
            },
        );
        Ok(sha)
    }

    pub fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.lock()?.remove(path);
        Ok(())
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        Ok(self.lock()?.get(path).cloned())
    }

    fn create(&self, path: &str, _message: &str, content: &str) -> Result<String, StoreError> {
        let mut blobs = self.lock()?;
        if blobs.contains_key(path) {
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }
        let sha = content_sha(content);
        blobs.insert(
            path.to_string(),
            Blob {
                content: content.to_string(),
                sha: sha.clone(),
            },
        );
        Ok(sha)
    }

    fn update(
        &self,
        path: &str,
        _message: &str,
        content: &str,
        sha: &str,
    ) -> Result<String, StoreError> {
        let mut blobs = self.lock()?;
        let current = blobs
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        if current.sha != sha {
            return Err(StoreError::Conflict {
                path: path.to_string(),
            });
        }
        current.content = content.to_string();
        current.sha = content_sha(content);
        Ok(current.sha.clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_twice_conflicts() {
        let store = MemoryBlobStore::new();
        store.create("p.csv", "init", "x").unwrap();
        assert!(matches!(
            store.create("p.csv", "init", "y"),
            Err(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn update_missing_blob_is_not_found() {
        let store = MemoryBlobStore::new();
        assert!(matches!(
            store.update("p.csv", "edit", "x", "abc"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryBlobStore::new();
        let other = store.clone();
        other.put("p.csv", "hello").unwrap();
        assert_eq!(store.get("p.csv").unwrap().unwrap().content, "hello");
    }
}
