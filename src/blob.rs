//! Binary storage for uploaded images. Rows only ever hold the returned URL.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stores `bytes` under `key` and returns the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, BlobError>;

    /// Removes the blob behind `url`. URLs this storage did not issue are ignored.
    async fn remove(&self, url: &str) -> Result<(), BlobError>;
}

/// Builds `{prefix}/{uuid}{filename}` with the filename reduced to a safe charset.
pub fn blob_key(prefix: &str, filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let safe: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    format!("{prefix}/{}{safe}", uuid::Uuid::new_v4())
}

/// Writes blobs below a directory that is served statically at `public_base_url`.
pub struct LocalBlobStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn key_of<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_base_url.as_str())?
            .strip_prefix('/')
            .filter(|key| !key.split('/').any(|part| part == ".."))
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        tracing::debug!(key, "blob stored");
        Ok(format!("{}/{key}", self.public_base_url))
    }

    async fn remove(&self, url: &str) -> Result<(), BlobError> {
        let Some(key) = self.key_of(url) else {
            tracing::debug!(url, "skipping removal of foreign blob url");
            return Ok(());
        };
        match fs::remove_file(self.root.join(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Keeps blobs in a map. `set_failing(true)` makes every call fail,
/// `fail_removal(url)` only the removal of that one blob.
#[derive(Default)]
pub struct MemoryBlobStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    failing: AtomicBool,
    stuck: Mutex<HashSet<String>>,
}

impl MemoryBlobStorage {
    const BASE: &'static str = "memory://blobs";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_removal(&self, url: &str) {
        self.stuck
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string());
    }

    pub fn contains(&self, url: &str) -> bool {
        self.blobs().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.blobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn blobs(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), BlobError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("memory blob storage offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        self.check()?;
        let url = format!("{}/{key}", Self::BASE);
        self.blobs().insert(url.clone(), bytes);
        Ok(url)
    }

    async fn remove(&self, url: &str) -> Result<(), BlobError> {
        self.check()?;
        if self.stuck.lock().unwrap_or_else(PoisonError::into_inner).contains(url) {
            return Err(BlobError::Unavailable(format!("cannot remove {url}")));
        }
        self.blobs().remove(url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_key_strips_path_and_unsafe_chars() {
        let key = blob_key("7", "../../etc/pass wd?.png");
        assert!(key.starts_with("7/"));
        assert!(key.ends_with("passwd.png"));
        assert!(!key.contains(".."));
    }

    #[test]
    fn local_storage_only_claims_its_own_urls() {
        let storage = LocalBlobStorage::new("uploads", "/uploads/");
        assert_eq!(storage.key_of("/uploads/7/a.png"), Some("7/a.png"));
        assert_eq!(storage.key_of("https://cdn.example.com/7/a.png"), None);
        assert_eq!(storage.key_of("/uploads/../secret"), None);
    }
}
