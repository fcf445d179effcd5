//! The external blob collaborator.
//!
//! File content never passes through the metadata store. It is sealed with the
//! file's key and handed to a [`BlobTransport`], which returns an opaque
//! locator. Both directions take a [`CancellationToken`] tied to the
//! originating request so an abandoned transfer stops and cleans up.

mod encrypted;
mod setup;

use bytes::Bytes;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use common::prelude::{Secret, SecretError};

pub use encrypted::EncryptedBlobs;
pub use setup::{setup_blobs_store, BlobsSetupError};

/// Plaintext pieces in order. An error ends the stream.
pub type BlobStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Content being opened as it is read from storage.
pub struct BlobDownload {
    /// Plaintext length implied by the stored size.
    pub len: u64,
    pub stream: BlobStream,
}

#[async_trait::async_trait]
pub trait BlobTransport: Send + Sync + 'static {
    /// Seal `data` under `key` and store it, returning its locator.
    async fn upload(
        &self,
        key: &Secret,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError>;

    /// Open the content behind `locator` for streaming.
    ///
    /// The returned stream keeps watching `cancel` and ends with
    /// [`TransportError::Cancelled`] once it fires.
    async fn download(
        &self,
        key: &Secret,
        locator: &str,
        cancel: &CancellationToken,
    ) -> Result<BlobDownload, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transfer cancelled")]
    Cancelled,

    #[error("no content stored at {0}")]
    NotFound(String),

    #[error("stored size {0} is not a sealed size")]
    Malformed(u64),

    #[error("storage backend: {0}")]
    Backend(#[from] object_store::BlobStoreError),

    #[error("content could not be sealed or opened: {0}")]
    Crypto(#[from] SecretError),
}
