//! Allocate/confirm and direct upload flows over the metadata store.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;

use common::id::{new_short, IdError};
use common::prelude::{Secret, SecretError};

use crate::blobs::{BlobStream, BlobTransport, TransportError};
use crate::database::{Database, Namespace, StoreError};
use crate::models::{FileRecord, PendingAllocation};

/// How long a reservation waits for its confirm.
pub const PENDING_TTL: Duration = Duration::hours(24);

#[derive(Clone)]
pub struct Coordinator {
    db: Database,
    blobs: Arc<dyn BlobTransport>,
}

impl Coordinator {
    pub fn new(db: Database, blobs: Arc<dyn BlobTransport>) -> Self {
        Self { db, blobs }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Reserve an identifier and key for a file that will be uploaded out of band.
    pub async fn request_allocation(
        &self,
        filename: &str,
        filesize: i64,
    ) -> Result<PendingAllocation, CoordinatorError> {
        self.request_allocation_at(filename, filesize, Utc::now())
            .await
    }

    pub async fn request_allocation_at(
        &self,
        filename: &str,
        filesize: i64,
        now: DateTime<Utc>,
    ) -> Result<PendingAllocation, CoordinatorError> {
        validate_file(filename, filesize)?;

        let pending = PendingAllocation {
            id: new_short()?,
            filename: filename.to_string(),
            filesize,
            key: Secret::generate()?,
            expire: now + PENDING_TTL,
        };

        self.db
            .put(Namespace::Pending, &pending.id, &pending)
            .await?;
        tracing::info!(id = %pending.id, filename = %pending.filename, "allocated");

        Ok(pending)
    }

    /// Commit a reservation once its content is stored at `external_locator`.
    pub async fn confirm(
        &self,
        id: &str,
        external_locator: &str,
    ) -> Result<FileRecord, CoordinatorError> {
        self.confirm_at(id, external_locator, Utc::now()).await
    }

    /// The read, expiry check, pending delete and committed put all happen in
    /// one transaction, so a reservation and its record never coexist.
    pub async fn confirm_at(
        &self,
        id: &str,
        external_locator: &str,
        now: DateTime<Utc>,
    ) -> Result<FileRecord, CoordinatorError> {
        if id.is_empty() {
            return Err(CoordinatorError::Validation("missing id".into()));
        }
        if external_locator.is_empty() {
            return Err(CoordinatorError::Validation("missing upload_id".into()));
        }

        let mut tx = self.db.begin().await?;
        let pending: Option<PendingAllocation> = Namespace::Pending.get(&mut tx, id).await?;

        let pending = match pending {
            Some(p) if !p.is_expired(now) => p,
            stale => {
                if stale.is_some() {
                    Namespace::Pending.delete(&mut tx, id).await?;
                    tx.commit().await.map_err(StoreError::from)?;
                    tracing::info!(id = %id, "confirm after expiry, reservation dropped");
                }
                return Err(CoordinatorError::Expired(id.to_string()));
            }
        };

        let record = pending.commit(external_locator.to_string(), now);
        Namespace::Pending.delete(&mut tx, id).await?;
        Namespace::Committed.put(&mut tx, id, &record).await?;
        tx.commit().await.map_err(StoreError::from)?;

        tracing::info!(id = %id, upload_id = %external_locator, "confirmed");
        Ok(record)
    }

    /// Store `data` through the blob transport and commit a record for it in one step.
    pub async fn direct_upload(
        &self,
        filename: &str,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<FileRecord, CoordinatorError> {
        self.direct_upload_at(filename, data, cancel, Utc::now())
            .await
    }

    pub async fn direct_upload_at(
        &self,
        filename: &str,
        data: Bytes,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<FileRecord, CoordinatorError> {
        let filesize = data.len() as i64;
        validate_file(filename, filesize)?;

        let key = Secret::generate()?;
        let external_locator = self.blobs.upload(&key, data, cancel).await?;

        let record = FileRecord {
            id: new_short()?,
            external_locator,
            filename: filename.to_string(),
            filesize,
            key,
            created_at: now,
        };

        self.db
            .put(Namespace::Committed, &record.id, &record)
            .await?;
        tracing::info!(
            id = %record.id,
            filename = %record.filename,
            size = record.filesize,
            "uploaded"
        );

        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<FileRecord, CoordinatorError> {
        self.db
            .get(Namespace::Committed, id)
            .await?
            .ok_or_else(|| CoordinatorError::NotFound(id.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<FileRecord>, CoordinatorError> {
        let entries = self.db.iterate(Namespace::Committed).await?;
        Ok(entries.into_iter().map(|(_, record)| record).collect())
    }

    /// Remove a committed record. Unknown ids are not an error.
    pub async fn delete(&self, id: &str) -> Result<(), CoordinatorError> {
        if id.is_empty() {
            return Err(CoordinatorError::Validation("missing id for the delete".into()));
        }
        self.db.delete(Namespace::Committed, id).await?;
        tracing::info!(id = %id, "deleted");
        Ok(())
    }

    /// Open the content of `record` for streaming.
    ///
    /// The stored content must be exactly the recorded size. This is checked
    /// before any byte is released.
    pub async fn download(
        &self,
        record: &FileRecord,
        cancel: &CancellationToken,
    ) -> Result<BlobStream, CoordinatorError> {
        let download = self
            .blobs
            .download(&record.key, &record.external_locator, cancel)
            .await?;

        if u64::try_from(record.filesize).ok() != Some(download.len) {
            tracing::error!(
                id = %record.id,
                stored = record.filesize,
                actual = download.len,
                "stored content does not match recorded size"
            );
            return Err(CoordinatorError::SizeMismatch {
                id: record.id.clone(),
                expected: record.filesize,
                actual: download.len,
            });
        }

        Ok(download.stream)
    }
}

fn validate_file(filename: &str, filesize: i64) -> Result<(), CoordinatorError> {
    if filename.trim().is_empty() {
        return Err(CoordinatorError::Validation("missing filename".into()));
    }
    if filesize < 0 {
        return Err(CoordinatorError::Validation(format!(
            "invalid filesize {}",
            filesize
        )));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("id does not exist: {0}")]
    NotFound(String),

    #[error("id was expired or unknown: {0}")]
    Expired(String),

    #[error("storage failed: {0}")]
    Storage(#[from] TransportError),

    #[error("metadata store: {0}")]
    Store(#[from] StoreError),

    #[error("identifier allocation failed: {0}")]
    Id(#[from] IdError),

    #[error("key generation failed: {0}")]
    Key(#[from] SecretError),

    #[error("content of {id} is {actual} bytes, recorded as {expected}")]
    SizeMismatch { id: String, expected: i64, actual: u64 },
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use futures::TryStreamExt;

    use object_store::BlobStore;

    use super::*;
    use crate::blobs::EncryptedBlobs;

    async fn coordinator() -> Coordinator {
        let db = Database::in_memory().await.unwrap();
        let blobs = EncryptedBlobs::new(BlobStore::memory());
        Coordinator::new(db, Arc::new(blobs))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    async fn read_all(stream: BlobStream) -> Vec<u8> {
        let parts: Vec<Bytes> = stream.try_collect().await.unwrap();
        parts.concat()
    }

    #[tokio::test]
    async fn test_allocate_then_confirm() {
        let c = coordinator().await;

        let pending = c
            .request_allocation_at("report.pdf", 1024, t0())
            .await
            .unwrap();
        assert_eq!(pending.id.len(), 22);
        assert_eq!(pending.expire, t0() + PENDING_TTL);

        let confirmed_at = t0() + Duration::hours(1);
        let record = c
            .confirm_at(&pending.id, "ext-locator", confirmed_at)
            .await
            .unwrap();
        assert_eq!(record.created_at, confirmed_at);

        let fetched = c.get(&pending.id).await.unwrap();
        assert_eq!(fetched.filename, "report.pdf");
        assert_eq!(fetched.filesize, 1024);
        assert_eq!(fetched.external_locator, "ext-locator");
        assert_eq!(fetched.key, pending.key);

        // the reservation is consumed
        let left: Option<PendingAllocation> = c
            .database()
            .get(Namespace::Pending, &pending.id)
            .await
            .unwrap();
        assert!(left.is_none());
    }

    #[tokio::test]
    async fn test_confirm_twice_fails() {
        let c = coordinator().await;
        let pending = c.request_allocation_at("a", 1, t0()).await.unwrap();

        c.confirm_at(&pending.id, "loc", t0()).await.unwrap();
        assert!(matches!(
            c.confirm_at(&pending.id, "loc", t0()).await,
            Err(CoordinatorError::Expired(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_after_expiry() {
        let c = coordinator().await;
        let pending = c.request_allocation_at("late.bin", 9, t0()).await.unwrap();

        let too_late = pending.expire + Duration::seconds(1);
        assert!(matches!(
            c.confirm_at(&pending.id, "loc", too_late).await,
            Err(CoordinatorError::Expired(_))
        ));

        // unresolvable in both namespaces
        let left: Option<PendingAllocation> = c
            .database()
            .get(Namespace::Pending, &pending.id)
            .await
            .unwrap();
        assert!(left.is_none());
        assert!(matches!(
            c.get(&pending.id).await,
            Err(CoordinatorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_at_deadline_succeeds() {
        let c = coordinator().await;
        let pending = c.request_allocation_at("edge", 1, t0()).await.unwrap();
        assert!(c.confirm_at(&pending.id, "loc", pending.expire).await.is_ok());
    }

    #[tokio::test]
    async fn test_confirm_unknown_id() {
        let c = coordinator().await;
        assert!(matches!(
            c.confirm_at("doesnotexist", "loc", t0()).await,
            Err(CoordinatorError::Expired(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_requires_locator() {
        let c = coordinator().await;
        let pending = c.request_allocation_at("a", 1, t0()).await.unwrap();
        assert!(matches!(
            c.confirm_at(&pending.id, "", t0()).await,
            Err(CoordinatorError::Validation(_))
        ));
        // still confirmable
        assert!(c.confirm_at(&pending.id, "loc", t0()).await.is_ok());
    }

    #[tokio::test]
    async fn test_allocation_validation() {
        let c = coordinator().await;
        assert!(matches!(
            c.request_allocation_at("", 1, t0()).await,
            Err(CoordinatorError::Validation(_))
        ));
        assert!(matches!(
            c.request_allocation_at("neg", -1, t0()).await,
            Err(CoordinatorError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_direct_upload_roundtrip() {
        let c = coordinator().await;
        let cancel = CancellationToken::new();

        let record = c
            .direct_upload("hello.txt", Bytes::from("hello world"), &cancel)
            .await
            .unwrap();
        assert_eq!(record.filesize, 11);

        let fetched = c.get(&record.id).await.unwrap();
        assert_eq!(fetched, record);

        let data = read_all(c.download(&fetched, &cancel).await.unwrap()).await;
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn test_download_streams_large_content() {
        let c = coordinator().await;
        let cancel = CancellationToken::new();
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 199) as u8).collect();

        let record = c
            .direct_upload("big.bin", Bytes::from(content.clone()), &cancel)
            .await
            .unwrap();
        let data = read_all(c.download(&record, &cancel).await.unwrap()).await;
        assert_eq!(data, content);
    }

    #[tokio::test]
    async fn test_download_size_mismatch() {
        let c = coordinator().await;
        let cancel = CancellationToken::new();

        let mut record = c
            .direct_upload("a.txt", Bytes::from("abc"), &cancel)
            .await
            .unwrap();
        record.filesize = 4;
        assert!(matches!(
            c.download(&record, &cancel).await,
            Err(CoordinatorError::SizeMismatch { expected: 4, actual: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_direct_upload_commits_nothing() {
        let c = coordinator().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = c.direct_upload("x", Bytes::from("x"), &cancel).await;
        assert!(matches!(
            result,
            Err(CoordinatorError::Storage(TransportError::Cancelled))
        ));
        assert!(c.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let c = coordinator().await;
        let cancel = CancellationToken::new();

        let a = c.direct_upload("a", Bytes::from("a"), &cancel).await.unwrap();
        let b = c.direct_upload("b", Bytes::from("b"), &cancel).await.unwrap();

        // pending reservations never show up in the listing
        c.request_allocation("pending", 1).await.unwrap();

        let mut ids: Vec<String> = c.list().await.unwrap().into_iter().map(|r| r.id).collect();
        ids.sort();
        let mut expected = vec![a.id.clone(), b.id.clone()];
        expected.sort();
        assert_eq!(ids, expected);

        c.delete(&a.id).await.unwrap();
        assert!(matches!(c.get(&a.id).await, Err(CoordinatorError::NotFound(_))));
        assert_eq!(c.list().await.unwrap().len(), 1);

        // deleting again is fine
        c.delete(&a.id).await.unwrap();
    }
}
