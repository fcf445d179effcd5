//! Object Storage Backend
//!
//! This crate stores sealed file content for the void gateway in pluggable
//! object storage (S3/MinIO/local filesystem/memory). Content is addressed by
//! an opaque *locator* minted at upload time; the gateway records the locator
//! in its metadata and hands it back on download.
//!
//! # Example
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use futures::TryStreamExt;
//! use void_object_store::{BlobStore, ObjectStoreConfig};
//!
//! # async fn example() -> Result<(), void_object_store::BlobStoreError> {
//! let store = BlobStore::new(ObjectStoreConfig::Memory).await?;
//!
//! let locator = BlobStore::mint_locator();
//! store.put(&locator, Bytes::from_static(b"sealed")).await?;
//! let (_size, stream) = store.get_stream(&locator).await?;
//! let parts: Vec<Bytes> = stream.try_collect().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod storage;

pub use error::{BlobStoreError, Result};
pub use storage::{BlobStore, ObjectStoreConfig};
