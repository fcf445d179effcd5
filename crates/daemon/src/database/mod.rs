mod namespace;
mod sqlite;

use std::ops::Deref;

use sqlx::{Sqlite, SqlitePool, Transaction};

pub use namespace::{Namespace, StoreError};

#[derive(Clone, Debug)]
pub struct Database(SqlitePool);

pub type DatabaseConnection = sqlx::SqliteConnection;

impl Database {
    pub async fn connect(database_url: &url::Url) -> Result<Self, DatabaseSetupError> {
        if database_url.scheme() == "sqlite" {
            let db = sqlite::connect_sqlite(database_url).await?;
            sqlite::migrate_sqlite(&db).await?;
            return Ok(Database::new(db));
        }

        Err(DatabaseSetupError::UnknownDbType(
            database_url.scheme().to_string(),
        ))
    }

    /// A private, migrated in-memory database.
    pub async fn in_memory() -> Result<Self, DatabaseSetupError> {
        let db = sqlite::connect_memory().await?;
        sqlite::migrate_sqlite(&db).await?;
        Ok(Database::new(db))
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self(pool)
    }

    /// Open a write transaction spanning both namespaces.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.0.begin().await?)
    }

    pub async fn get<T>(&self, ns: Namespace, id: &str) -> Result<Option<T>, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut conn = self.0.acquire().await?;
        ns.get(&mut conn, id).await
    }

    pub async fn put<T>(&self, ns: Namespace, id: &str, value: &T) -> Result<(), StoreError>
    where
        T: serde::Serialize,
    {
        let mut tx = self.begin().await?;
        ns.put(&mut tx, id, value).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, ns: Namespace, id: &str) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        ns.delete(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Every entry in `ns`, ordered by id, read from one snapshot.
    pub async fn iterate<T>(&self, ns: Namespace) -> Result<Vec<(String, T)>, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut tx = self.0.begin().await?;
        let entries = ns.iterate(&mut tx).await?;
        tx.commit().await?;
        Ok(entries)
    }

    /// Cheap round trip used by readiness checks.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.0).await?;
        Ok(())
    }
}

impl Deref for Database {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseSetupError {
    #[error("error occurred while attempting database migration: {0}")]
    MigrationFailed(#[from] sqlx::migrate::MigrateError),

    #[error("unable to perform initial connection and check of the database: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("requested database type was not recognized: {0}")]
    UnknownDbType(String),
}
