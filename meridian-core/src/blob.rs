//! Blob store capability trait.
//!
//! Large feature payloads are offloaded to an object store keyed by an
//! opaque path. The interface is the minimal put/get/delete triple; failures
//! are opaque I/O errors from the implementation.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

/// Object store keyed by an opaque path.
#[async_trait]
pub trait BlobStore: Debug + Send + Sync {
    /// Write bytes at the given key, overwriting any existing object.
    async fn put_object(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the object at the given key.
    ///
    /// Returns `Error::NotFound` if no object exists.
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete an object. Idempotent: deleting a missing key succeeds.
    async fn delete_object(&self, key: &str) -> Result<()>;
}

/// A simple in-memory blob store for testing and embedded use.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    /// Create a new empty blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects (test helper).
    pub fn len(&self) -> usize {
        self.data.read().expect("RwLock poisoned").len()
    }

    /// True when the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_object(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.data
            .write()
            .expect("RwLock poisoned")
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        self.data
            .read()
            .expect("RwLock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.data.write().expect("RwLock poisoned").remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_blob_roundtrip() {
        let blobs = MemoryBlobStore::new();
        blobs.put_object("a/b/c", b"payload").await.unwrap();
        assert_eq!(blobs.get_object("a/b/c").await.unwrap(), b"payload");

        blobs.delete_object("a/b/c").await.unwrap();
        assert!(matches!(
            blobs.get_object("a/b/c").await,
            Err(Error::NotFound(_))
        ));

        // Idempotent delete
        blobs.delete_object("a/b/c").await.unwrap();
    }
}
