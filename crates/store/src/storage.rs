//! File storage backend abstraction (S3/MinIO/local filesystem/memory).
//!
//! Paths are deterministic, derived purely from the owning record:
//! `{owner}/{asset-name}/original/{filename}` for originals and
//! `{owner}/{asset-name}/{height}/{filename}` for derived files. There are
//! no random components, so file locations are always reconstructable from
//! the record store.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Configuration for the file storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

/// Wrapper around different file storage backends.
#[derive(Debug, Clone)]
pub(crate) struct Storage {
    inner: Arc<dyn ObjectStore>,
}

impl Storage {
    /// Create a new storage backend from configuration.
    pub async fn new(config: FileStoreConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            FileStoreConfig::Memory => Arc::new(InMemory::new()),

            FileStoreConfig::Local { path } => {
                // Ensure directory exists
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| StoreError::InvalidConfig(e.to_string()))?,
                )
            }

            FileStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| StoreError::InvalidConfig(e.to_string()))?,
                );

                // Verify bucket exists by listing (empty prefix).
                // This will fail fast if the bucket doesn't exist.
                {
                    let prefix = ObjectPath::from("");
                    let mut stream = store.list(Some(&prefix));
                    match stream.try_next().await {
                        Ok(_) => {}
                        Err(object_store::Error::NotFound { .. }) => {
                            return Err(StoreError::BucketNotFound(bucket.clone()));
                        }
                        Err(e) => {
                            let msg = e.to_string();
                            if msg.contains("NoSuchBucket")
                                || msg.contains("bucket") && msg.contains("not")
                            {
                                return Err(StoreError::BucketNotFound(bucket.clone()));
                            }
                            return Err(e.into());
                        }
                    }
                }

                store
            }
        };

        Ok(Self { inner })
    }

    /// Build the path for an asset's original file.
    pub fn original_path(owner: &str, asset: &str, filename: &str) -> ObjectPath {
        ObjectPath::from(format!("{}/{}/original/{}", owner, asset, filename))
    }

    /// Build the path for a derived file at one height.
    pub fn derived_path(owner: &str, asset: &str, height: u32, filename: &str) -> ObjectPath {
        ObjectPath::from(format!("{}/{}/{}/{}", owner, asset, height, filename))
    }

    /// Prefix covering every file belonging to one asset.
    pub fn asset_prefix(owner: &str, asset: &str) -> ObjectPath {
        ObjectPath::from(format!("{}/{}", owner, asset))
    }

    /// Put a file at the given path.
    pub async fn put(&self, path: &ObjectPath, data: Bytes) -> Result<()> {
        self.inner.put(path, data.into()).await?;
        Ok(())
    }

    /// Get a file's bytes from the given path.
    pub async fn get(&self, path: &ObjectPath) -> Result<Option<Bytes>> {
        match self.inner.get(path).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(bytes))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a single file.
    pub async fn delete(&self, path: &ObjectPath) -> Result<()> {
        // Ignore NotFound errors - the file may already be deleted
        match self.inner.delete(path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every file under a prefix, returning how many were removed.
    ///
    /// This is the cascade step for asset deletion: the prefix walk replaces
    /// any separately-tracked file list.
    pub async fn delete_prefix(&self, prefix: &ObjectPath) -> Result<usize> {
        let items: Vec<_> = self.inner.list(Some(prefix)).try_collect().await?;

        let mut removed = 0;
        for meta in items {
            self.delete(&meta.location).await?;
            removed += 1;
        }
        Ok(removed)
    }

    /// List the paths under a prefix.
    pub async fn list_prefix(&self, prefix: &ObjectPath) -> Result<Vec<ObjectPath>> {
        let items: Vec<_> = self.inner.list(Some(prefix)).try_collect().await?;
        Ok(items.into_iter().map(|meta| meta.location).collect())
    }
}

#[cfg(test)]
impl Storage {
    /// Create an in-memory storage backend (test-only).
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }
}
