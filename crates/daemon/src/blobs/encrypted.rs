use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use common::crypto::{plaintext_len, Opener};
use common::prelude::Secret;
use object_store::{BlobStore, BlobStoreError};

use super::{BlobDownload, BlobStream, BlobTransport, TransportError};

/// Seals content with ChaCha20-Poly1305 and keeps the ciphertext in a
/// [`BlobStore`] under a freshly minted locator.
#[derive(Debug, Clone)]
pub struct EncryptedBlobs {
    store: BlobStore,
}

impl EncryptedBlobs {
    pub fn new(store: BlobStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }
}

#[async_trait::async_trait]
impl BlobTransport for EncryptedBlobs {
    async fn upload(
        &self,
        key: &Secret,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let sealed = Bytes::from(key.encrypt(&data)?);
        let locator = BlobStore::mint_locator();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // the put may have landed partially before we stopped polling it
                if let Err(e) = self.store.delete(&locator).await {
                    tracing::warn!(locator = %locator, error = %e, "failed to remove cancelled upload");
                }
                tracing::debug!(locator = %locator, "upload cancelled");
                Err(TransportError::Cancelled)
            }
            result = self.store.put(&locator, sealed) => {
                result?;
                tracing::debug!(locator = %locator, size = data.len(), "upload stored");
                Ok(locator)
            }
        }
    }

    async fn download(
        &self,
        key: &Secret,
        locator: &str,
        cancel: &CancellationToken,
    ) -> Result<BlobDownload, TransportError> {
        let (sealed_len, sealed) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = self.store.get_stream(locator) => match result {
                Ok(opened) => opened,
                Err(BlobStoreError::NotFound(l)) => return Err(TransportError::NotFound(l)),
                Err(e) => return Err(e.into()),
            },
        };

        let len = plaintext_len(sealed_len).ok_or(TransportError::Malformed(sealed_len))?;
        tracing::debug!(locator = %locator, size = len, "download opened");

        Ok(BlobDownload {
            len,
            stream: open_stream(sealed, key.opener(), cancel.clone()),
        })
    }
}

type SealedStream = BoxStream<'static, Result<Bytes, BlobStoreError>>;

/// Open sealed pieces as they arrive, releasing each frame once it verifies.
fn open_stream(sealed: SealedStream, opener: Opener, cancel: CancellationToken) -> BlobStream {
    stream::unfold(Some((sealed, opener, cancel)), |state| async move {
        let (mut sealed, mut opener, cancel) = state?;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Some((Err(TransportError::Cancelled), None)),
                next = sealed.next() => next,
            };

            match next {
                Some(Ok(piece)) => match opener.push(&piece) {
                    Ok(plain) if plain.is_empty() => continue,
                    Ok(plain) => {
                        return Some((Ok(Bytes::from(plain)), Some((sealed, opener, cancel))))
                    }
                    Err(e) => return Some((Err(e.into()), None)),
                },
                Some(Err(e)) => return Some((Err(e.into()), None)),
                None => {
                    return match opener.finish() {
                        Ok(plain) if plain.is_empty() => None,
                        Ok(plain) => Some((Ok(Bytes::from(plain)), None)),
                        Err(e) => Some((Err(e.into()), None)),
                    }
                }
            }
        }
    })
    .boxed()
}
