use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::Row;

use super::DatabaseConnection;

/// The two logical keyspaces of the metadata store.
///
/// Each maps an identifier string to a JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Reservations waiting for their external upload to be confirmed.
    Pending,
    /// Durable file records.
    Committed,
}

impl Namespace {
    fn table(&self) -> &'static str {
        match self {
            Namespace::Pending => "pending",
            Namespace::Committed => "committed",
        }
    }

    pub async fn get<T>(
        &self,
        conn: &mut DatabaseConnection,
        id: &str,
    ) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let sql = format!("SELECT value FROM {} WHERE id = ?", self.table());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get("value");
                Ok(Some(decode(id, &raw)?))
            }
            None => Ok(None),
        }
    }

    pub async fn put<T>(
        &self,
        conn: &mut DatabaseConnection,
        id: &str,
        value: &T,
    ) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        let raw = serde_json::to_string(value).map_err(StoreError::Encode)?;
        let sql = format!(
            "INSERT INTO {} (id, value) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET value = excluded.value",
            self.table()
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(raw)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, conn: &mut DatabaseConnection, id: &str) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.table());
        sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
        Ok(())
    }

    pub async fn iterate<T>(
        &self,
        conn: &mut DatabaseConnection,
    ) -> Result<Vec<(String, T)>, StoreError>
    where
        T: DeserializeOwned,
    {
        let sql = format!("SELECT id, value FROM {} ORDER BY id", self.table());
        let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

        rows.into_iter()
            .map(|row| {
                let id: String = row.get("id");
                let raw: String = row.get("value");
                let value = decode(&id, &raw)?;
                Ok((id, value))
            })
            .collect()
    }
}

fn decode<T: DeserializeOwned>(id: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Decode {
        id: id.to_string(),
        source,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode record: {0}")]
    Encode(serde_json::Error),

    #[error("stored record {id} is malformed: {source}")]
    Decode {
        id: String,
        source: serde_json::Error,
    },
}
