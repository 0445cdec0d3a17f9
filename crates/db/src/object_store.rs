//! Binary artifact storage (photos, rendered reports).
//!
//! The core only records the URLs returned here; lifecycle management of
//! the stored objects belongs to the storage backend.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// `(path, bytes) -> URL` object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Store `bytes` under the relative `path`, replacing any previous
    /// object, and return the URL it can be fetched from.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, StoreError>;
}

/// Reject absolute paths and any `..` traversal.
fn validate_object_path(path: &str) -> Result<(), StoreError> {
    let candidate = Path::new(path);
    let is_clean = !path.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if is_clean {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(format!(
            "object path '{path}' must be relative and must not traverse"
        )))
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

// ---------------------------------------------------------------------------
// LocalObjectStore
// ---------------------------------------------------------------------------

/// Stores objects as files under a root directory.
pub struct LocalObjectStore {
    root: PathBuf,
    base_url: String,
}

impl LocalObjectStore {
    /// `base_url` is the public prefix under which `root` is served.
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        validate_object_path(path)?;
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = bytes.len();
        tokio::fs::write(&target, bytes).await?;
        tracing::debug!(path, size, "Stored object");
        Ok(join_url(&self.base_url, path))
    }
}

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

/// Object store kept in a process-local map.
pub struct MemoryObjectStore {
    base_url: String,
    objects: RwLock<HashMap<String, Vec<u8>>>,
    available: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory object store marked unavailable".into(),
            ));
        }
        validate_object_path(path)?;
        self.objects.write().await.insert(path.to_string(), bytes);
        Ok(join_url(&self.base_url, path))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
