//! Object storage backend abstraction (S3/MinIO/local filesystem/memory).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BlobStoreError, Result};

/// Configuration for the object storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Filesystem {
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

/// Sealed file content keyed by locator.
#[derive(Debug, Clone)]
pub struct BlobStore {
    inner: Arc<dyn ObjectStore>,
}

impl BlobStore {
    /// Create a new storage backend from configuration.
    pub async fn new(config: ObjectStoreConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            ObjectStoreConfig::Memory => Arc::new(InMemory::new()),

            ObjectStoreConfig::Filesystem { path } => {
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?,
                )
            }

            ObjectStoreConfig::S3 {
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
                        .map_err(|e| BlobStoreError::InvalidConfig(e.to_string()))?,
                );

                // Fail fast if the bucket doesn't exist
                {
                    use futures::TryStreamExt;
                    let prefix = ObjectPath::from("");
                    let mut stream = store.list(Some(&prefix));
                    match stream.try_next().await {
                        Ok(_) => {}
                        Err(object_store::Error::NotFound { .. }) => {
                            return Err(BlobStoreError::BucketNotFound(bucket.clone()));
                        }
                        Err(e) => {
                            let msg = e.to_string();
                            if msg.contains("NoSuchBucket") {
                                return Err(BlobStoreError::BucketNotFound(bucket.clone()));
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

    /// Create an in-memory storage backend.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }

    /// Mint a fresh, unguessable locator for new content.
    pub fn mint_locator() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    fn blob_path(locator: &str) -> Result<ObjectPath> {
        if locator.is_empty()
            || locator.contains('/')
            || locator == "."
            || locator == ".."
        {
            return Err(BlobStoreError::InvalidLocator(locator.to_string()));
        }
        Ok(ObjectPath::from(format!("blobs/{}", locator)))
    }

    /// Put content under a locator, replacing anything already there.
    pub async fn put(&self, locator: &str, data: Bytes) -> Result<()> {
        let path = Self::blob_path(locator)?;
        debug!(locator, size = data.len(), "storing blob");
        self.inner.put(&path, data.into()).await?;
        Ok(())
    }

    /// Open content by locator for reading in pieces.
    ///
    /// Returns the stored size alongside a stream of its bytes.
    pub async fn get_stream(
        &self,
        locator: &str,
    ) -> Result<(u64, BoxStream<'static, Result<Bytes>>)> {
        let path = Self::blob_path(locator)?;
        match self.inner.get(&path).await {
            Ok(result) => {
                let size = result.meta.size as u64;
                let stream = result.into_stream().map_err(BlobStoreError::from).boxed();
                Ok((size, stream))
            }
            Err(object_store::Error::NotFound { .. }) => {
                Err(BlobStoreError::NotFound(locator.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete content by locator. Missing content is not an error.
    pub async fn delete(&self, locator: &str) -> Result<()> {
        let path = Self::blob_path(locator)?;
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read(store: &BlobStore, locator: &str) -> Result<Bytes> {
        let (_, stream) = store.get_stream(locator).await?;
        let parts: Vec<Bytes> = stream.try_collect().await?;
        Ok(Bytes::from(parts.concat()))
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let store = BlobStore::memory();

        let locator = BlobStore::mint_locator();
        let data = Bytes::from("hello world");

        store.put(&locator, data.clone()).await.unwrap();
        assert_eq!(read(&store, &locator).await.unwrap(), data);

        store.delete(&locator).await.unwrap();
        assert!(matches!(
            read(&store, &locator).await,
            Err(BlobStoreError::NotFound(_))
        ));

        // deleting twice is fine
        store.delete(&locator).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_stream() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(ObjectStoreConfig::Filesystem {
            path: temp_dir.path().to_path_buf(),
        })
        .await
        .unwrap();

        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();
        let locator = BlobStore::mint_locator();
        store.put(&locator, Bytes::from(data.clone())).await.unwrap();

        let (size, stream) = store.get_stream(&locator).await.unwrap();
        assert_eq!(size, data.len() as u64);
        let parts: Vec<Bytes> = stream.try_collect().await.unwrap();
        assert_eq!(parts.concat(), data);

        assert!(matches!(
            store.get_stream("nothing-here").await,
            Err(BlobStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_blob() {
        let store = BlobStore::memory();
        let err = read(&store, "nothing-here").await.unwrap_err();
        assert!(matches!(err, BlobStoreError::NotFound(l) if l == "nothing-here"));
    }

    #[tokio::test]
    async fn test_filesystem_storage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = ObjectStoreConfig::Filesystem {
            path: temp_dir.path().to_path_buf(),
        };
        let store = BlobStore::new(config).await.unwrap();

        let locator = BlobStore::mint_locator();
        store.put(&locator, Bytes::from("test data")).await.unwrap();

        assert!(temp_dir.path().join("blobs").join(&locator).exists());
        assert_eq!(read(&store, &locator).await.unwrap(), Bytes::from("test data"));
    }

    #[tokio::test]
    async fn test_rejects_path_like_locators() {
        let store = BlobStore::memory();
        for bad in ["", "a/b", "..", "."] {
            assert!(matches!(
                store.put(bad, Bytes::new()).await,
                Err(BlobStoreError::InvalidLocator(_))
            ));
        }
    }

    #[test]
    fn test_minted_locators_are_distinct() {
        assert_ne!(BlobStore::mint_locator(), BlobStore::mint_locator());
    }

    #[test]
    fn test_default_config_is_memory() {
        assert_eq!(ObjectStoreConfig::default(), ObjectStoreConfig::Memory);
    }
}
