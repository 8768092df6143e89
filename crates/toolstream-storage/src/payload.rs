//! Object storage behind the broker's payload surface.
//!
//! The bucket-existence check is memoized behind an async read-write lock:
//! the first caller takes the write side and probes (or creates, where the
//! backend supports it), later callers read the cached flag without
//! blocking each other.

use std::path::Path as FsPath;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, StorageError};

/// Object storage surface used by the publish, fetch, and sweep paths.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Verify the bucket is usable, creating it where the backend supports
    /// creation. Memoized; cheap after the first call.
    async fn ensure_bucket(&self) -> Result<()>;

    /// Store a payload under `object_name`.
    async fn put(&self, object_name: &str, data: Bytes) -> Result<()>;

    /// Retrieve the payload stored under `object_name`.
    async fn get(&self, object_name: &str) -> Result<Bytes>;

    /// Delete the payload stored under `object_name`.
    async fn delete(&self, object_name: &str) -> Result<()>;
}

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub use_ssl: bool,
    pub bucket_name: String,
}

/// Payload store over any `object_store` backend.
pub struct PayloadStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    // Whether the backend can create the bucket itself (filesystem and
    // memory backends) or can only verify it (S3).
    creates_bucket: bool,
    bucket_ready: RwLock<bool>,
}

impl PayloadStore {
    /// Connect to an S3-compatible endpoint such as MinIO.
    pub fn s3(config: &S3Config) -> Result<Self> {
        let scheme = if config.use_ssl { "https" } else { "http" };
        let endpoint = format!("{scheme}://{}", config.endpoint);

        let store = AmazonS3Builder::new()
            .with_endpoint(endpoint)
            .with_allow_http(!config.use_ssl)
            .with_region("us-east-1")
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_bucket_name(&config.bucket_name)
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket_name.clone(),
            creates_bucket: false,
            bucket_ready: RwLock::new(false),
        })
    }

    /// Local filesystem backend; the bucket is a directory under `root`.
    pub fn local(root: &FsPath, bucket: &str) -> Result<Self> {
        let bucket_dir = root.join(bucket);
        std::fs::create_dir_all(&bucket_dir)
            .map_err(|e| StorageError::Config(format!("create {}: {e}", bucket_dir.display())))?;
        let store = LocalFileSystem::new_with_prefix(&bucket_dir)
            .map_err(|e| StorageError::Config(e.to_string()))?;
        Ok(Self {
            store: Arc::new(store),
            bucket: bucket.to_string(),
            creates_bucket: true,
            bucket_ready: RwLock::new(false),
        })
    }

    /// In-memory backend for tests.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            bucket: "memory".to_string(),
            creates_bucket: true,
            bucket_ready: RwLock::new(false),
        }
    }

    fn path(object_name: &str) -> Path {
        Path::from(object_name)
    }
}

#[async_trait]
impl ObjectStorage for PayloadStore {
    async fn ensure_bucket(&self) -> Result<()> {
        if *self.bucket_ready.read().await {
            return Ok(());
        }

        let mut ready = self.bucket_ready.write().await;
        if *ready {
            return Ok(());
        }

        if self.creates_bucket {
            // Creation already happened at construction for these backends.
            debug!(bucket = %self.bucket, "bucket ready");
        } else {
            // The object_store S3 client has no bucket administration, so a
            // missing bucket is verified rather than created here.
            self.store
                .list_with_delimiter(None)
                .await
                .map_err(|source| StorageError::Bucket {
                    bucket: self.bucket.clone(),
                    source,
                })?;
            info!(bucket = %self.bucket, "bucket verified");
        }

        *ready = true;
        Ok(())
    }

    async fn put(&self, object_name: &str, data: Bytes) -> Result<()> {
        self.ensure_bucket().await?;
        debug!(bucket = %self.bucket, object = %object_name, size = data.len(), "uploading object");
        self.store.put(&Self::path(object_name), data).await?;
        Ok(())
    }

    async fn get(&self, object_name: &str) -> Result<Bytes> {
        self.ensure_bucket().await?;
        let result = self.store.get(&Self::path(object_name)).await;
        match result {
            Ok(object) => Ok(object.bytes().await?),
            Err(object_store::Error::NotFound { .. }) => {
                Err(StorageError::NotFound(object_name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, object_name: &str) -> Result<()> {
        match self.store.delete(&Self::path(object_name)).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                Err(StorageError::NotFound(object_name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
