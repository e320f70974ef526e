//! Storage backends for the registry API tree
//!
//! Keys are `/`-separated relative paths such as
//! `widgets/acme/clock/meta.json`.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid key format: {0}")]
    InvalidKey(String),
}

/// A place the API documents are written to
///
/// A `put` replaces the whole value; readers never observe a partial write.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError>;

    /// Fails with [`StorageError::NotFound`] for absent keys
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete every key below `prefix`
    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError>;
}

/// Reject empty, absolute and parent-relative keys
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// In-memory API tree, keyed in sorted order
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> Result<MutexGuard<'_, BTreeMap<String, Vec<u8>>>, StorageError> {
        self.blobs
            .lock()
            .map_err(|_| StorageError::Backend("memory storage lock poisoned".into()))
    }

    /// Every stored key, sorted
    pub fn keys(&self) -> Vec<String> {
        self.blobs().map(|b| b.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.blobs().map(|b| b.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStorage for MemoryStorage {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        validate_key(key)?;
        self.blobs()?.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        self.blobs()?
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(self.blobs()?.contains_key(key))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        validate_key(prefix)?;
        let nested = format!("{prefix}/");
        self.blobs()?
            .retain(|key, _| key != prefix && !key.starts_with(&nested));
        Ok(())
    }
}
