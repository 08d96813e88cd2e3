//! Blob stores: named text blobs addressed by path, versioned by a content hash.
//!
//! The contract mirrors a source-control contents API: reads return the
//! content together with its hash, and updates must present the hash they
//! were based on. A stale hash is a [`StoreError::Conflict`].

mod fs;
mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use sha2::{Digest, Sha256};

use crate::error::StoreError;

/// A blob's content and the hash identifying that version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content: String,
    pub sha: String,
}

pub trait BlobStore {
    /// Fetch a blob; `Ok(None)` when it does not exist.
    fn get(&self, path: &str) -> Result<Option<Blob>, StoreError>;

    /// Create a new blob. Fails with a conflict if it already exists.
    /// Returns the new hash.
    fn create(&self, path: &str, message: &str, content: &str) -> Result<String, StoreError>;

    /// Replace a blob whose current hash is `sha`. Returns the new hash.
    fn update(
        &self,
        path: &str,
        message: &str,
        content: &str,
        sha: &str,
    ) -> Result<String, StoreError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Update when a hash is known, create otherwise.
    fn upsert(
        &self,
        path: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
    ) -> Result<String, StoreError> {
        match sha {
            Some(sha) => self.update(path, message, content, sha),
            None => self.create(path, message, content),
        }
    }
}

impl<B: BlobStore + ?Sized> BlobStore for Box<B> {
    fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        (**self).get(path)
    }

    fn create(&self, path: &str, message: &str, content: &str) -> Result<String, StoreError> {
        (**self).create(path, message, content)
    }

    fn update(
        &self,
        path: &str,
        message: &str,
        content: &str,
        sha: &str,
    ) -> Result<String, StoreError> {
        (**self).update(path, message, content, sha)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Hex SHA-256 of the content; the version hash for local stores.
pub fn content_sha(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
