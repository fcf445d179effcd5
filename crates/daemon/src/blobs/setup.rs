//! Blob store setup logic.

use std::path::Path;

use object_store::{BlobStore, ObjectStoreConfig};

use crate::state::{BlobStoreConfig, BLOBS_DIR_NAME};

use super::EncryptedBlobs;

/// Build the blob transport from configuration.
///
/// A filesystem store without an explicit path lives in `void_dir/blobs`.
pub async fn setup_blobs_store(
    config: &BlobStoreConfig,
    void_dir: &Path,
) -> Result<EncryptedBlobs, BlobsSetupError> {
    let store_config = match config {
        BlobStoreConfig::Memory => {
            tracing::warn!("Using in-memory blob store, content will not survive a restart");
            ObjectStoreConfig::Memory
        }

        BlobStoreConfig::Filesystem { path } => {
            let path = path
                .clone()
                .unwrap_or_else(|| void_dir.join(BLOBS_DIR_NAME));
            tracing::info!(path = %path.display(), "Using local filesystem blob store");
            ObjectStoreConfig::Filesystem { path }
        }

        BlobStoreConfig::S3 {
            endpoint,
            access_key,
            secret_key,
            bucket,
            region,
        } => {
            tracing::info!(endpoint = %endpoint, bucket = %bucket, "Using S3 blob store");
            ObjectStoreConfig::S3 {
                endpoint: endpoint.clone(),
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                bucket: bucket.clone(),
                region: region.clone(),
            }
        }
    };

    let store = BlobStore::new(store_config).await?;
    Ok(EncryptedBlobs::new(store))
}

#[derive(Debug, thiserror::Error)]
pub enum BlobsSetupError {
    #[error("blob store error: {0}")]
    StoreError(#[from] object_store::BlobStoreError),
}
