//! Records kept in the metadata store and their wire form.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use common::prelude::Secret;

/// A reserved identifier awaiting confirmation of its external upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAllocation {
    pub id: String,
    pub filename: String,
    pub filesize: i64,
    pub key: Secret,
    pub expire: DateTime<Utc>,
}

impl PendingAllocation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expire
    }

    /// Promote this reservation to a durable record.
    pub fn commit(self, external_locator: String, now: DateTime<Utc>) -> FileRecord {
        FileRecord {
            id: self.id,
            external_locator,
            filename: self.filename,
            filesize: self.filesize,
            key: self.key,
            created_at: now,
        }
    }
}

/// A durable, user-visible file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    #[serde(rename = "upload_id")]
    pub external_locator: String,
    pub filename: String,
    pub filesize: i64,
    pub key: Secret,
    pub created_at: DateTime<Utc>,
}

/// The JSON shape exchanged with clients for both reservations and records.
///
/// Fields that do not apply to a given stage are sent as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: String,
    #[serde(default)]
    pub upload_id: String,
    pub filename: String,
    pub filesize: i64,
    pub key: Secret,
    #[serde(default)]
    pub expire: String,
    #[serde(default)]
    pub created_at: String,
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl From<&PendingAllocation> for Metadata {
    fn from(p: &PendingAllocation) -> Self {
        Self {
            id: p.id.clone(),
            upload_id: String::new(),
            filename: p.filename.clone(),
            filesize: p.filesize,
            key: p.key.clone(),
            expire: timestamp(&p.expire),
            created_at: String::new(),
        }
    }
}

impl From<&FileRecord> for Metadata {
    fn from(r: &FileRecord) -> Self {
        Self {
            id: r.id.clone(),
            upload_id: r.external_locator.clone(),
            filename: r.filename.clone(),
            filesize: r.filesize,
            key: r.key.clone(),
            expire: String::new(),
            created_at: timestamp(&r.created_at),
        }
    }
}

// one line per record in `void ls`
impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.id, self.filename, self.filesize, self.upload_id
        )
    }
}

/// Body of a successful direct upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn pending(now: DateTime<Utc>) -> PendingAllocation {
        PendingAllocation {
            id: "shortid".to_string(),
            filename: "notes.txt".to_string(),
            filesize: 42,
            key: Secret::from([1u8; 32]),
            expire: now + Duration::hours(24),
        }
    }

    #[test]
    fn test_expiry_is_strictly_after_deadline() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let p = pending(now);
        assert!(!p.is_expired(now));
        assert!(!p.is_expired(p.expire));
        assert!(p.is_expired(p.expire + Duration::seconds(1)));
    }

    #[test]
    fn test_commit_keeps_fields() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = pending(now).commit("loc-1".to_string(), now);
        assert_eq!(record.id, "shortid");
        assert_eq!(record.filename, "notes.txt");
        assert_eq!(record.filesize, 42);
        assert_eq!(record.external_locator, "loc-1");
        assert_eq!(record.created_at, now);
    }

    #[test]
    fn test_record_stores_locator_as_upload_id() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = pending(now).commit("loc-1".to_string(), now);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["upload_id"], "loc-1");
        assert!(json.get("external_locator").is_none());
    }

    #[test]
    fn test_allocation_wire_form() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let meta = Metadata::from(&pending(now));
        let json = serde_json::to_value(&meta).unwrap();

        assert_eq!(json["upload_id"], "");
        assert_eq!(json["created_at"], "");
        assert_eq!(json["expire"], "2024-01-02T00:00:00Z");
        assert_eq!(json["filesize"], 42);
        assert!(json["key"].is_string());
    }

    #[test]
    fn test_metadata_line() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let meta = Metadata::from(&pending(now).commit("loc".to_string(), now));
        assert_eq!(meta.to_string(), "shortid\tnotes.txt\t42\tloc");
    }
}
