use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use url::Url;

use crate::abuse_guard::{AbuseGuard, AuthError};
use crate::blobs::{setup_blobs_store, BlobTransport, BlobsSetupError};
use crate::coordinator::Coordinator;
use crate::database::{Database, DatabaseSetupError};
use crate::service_config::Config;

/// Basic auth credentials that unlock privileged operations.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Unset credentials match nothing.
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.is_configured() && username == self.username && password == self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Main service state shared by every request handler.
#[derive(Clone)]
pub struct State {
    coordinator: Coordinator,
    guard: Arc<AbuseGuard>,
    credentials: Arc<Credentials>,
    anonymous_put: bool,
    upload_timeout: Duration,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Setup database
        let sqlite_database_url = match config.sqlite_path {
            Some(ref path) => {
                if !path.exists() {
                    return Err(StateSetupError::DatabasePathDoesNotExist);
                }
                Url::parse(&format!("sqlite://{}", path.display()))
                    .map_err(|_| StateSetupError::InvalidDatabaseUrl)?
            }
            None => Url::parse("sqlite::memory:").map_err(|_| StateSetupError::InvalidDatabaseUrl)?,
        };
        tracing::info!("Database URL: {}", sqlite_database_url);
        let database = if config.sqlite_path.is_some() {
            Database::connect(&sqlite_database_url).await?
        } else {
            Database::in_memory().await?
        };

        // 2. Setup blobs store
        let blobs = setup_blobs_store(&config.blob_store, &config.void_dir).await?;

        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        if !credentials.is_configured() {
            tracing::warn!("no username/password configured, privileged operations are disabled");
        }

        Ok(Self::new(
            database,
            Arc::new(blobs),
            credentials,
            config.anonymous_put,
            config.upload_timeout,
        ))
    }

    pub fn new(
        database: Database,
        blobs: Arc<dyn BlobTransport>,
        credentials: Credentials,
        anonymous_put: bool,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            coordinator: Coordinator::new(database, blobs),
            guard: Arc::new(AbuseGuard::default()),
            credentials: Arc::new(credentials),
            anonymous_put,
            upload_timeout,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn database(&self) -> &Database {
        self.coordinator.database()
    }

    pub fn guard(&self) -> &Arc<AbuseGuard> {
        &self.guard
    }

    pub fn anonymous_put(&self) -> bool {
        self.anonymous_put
    }

    pub fn upload_timeout(&self) -> Duration {
        self.upload_timeout
    }

    /// Check presented Basic credentials for `ip` through the abuse guard.
    ///
    /// A request without credentials is only a challenge round trip. It is
    /// refused without touching the guard, so only wrong credentials count
    /// toward a lockout.
    pub fn authorize(&self, ip: &str, presented: Option<(&str, &str)>) -> Result<(), AuthError> {
        let Some((user, pass)) = presented else {
            tracing::debug!(ip = %ip, "credentials requested");
            return Err(AuthError::MissingCredentials);
        };

        self.guard
            .authenticate(ip, Instant::now(), || {
                if self.credentials.matches(user, pass) {
                    tracing::info!(ip = %ip, user = %user, "login");
                    Ok(())
                } else {
                    Err(AuthError::InvalidCredentials)
                }
            })
            .inspect_err(|e| tracing::warn!(ip = %ip, error = %e, "unauthorized request"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Database path does not exist")]
    DatabasePathDoesNotExist,

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Database setup error: {0}")]
    DatabaseSetupError(#[from] DatabaseSetupError),

    #[error("Blobs store error: {0}")]
    BlobsStoreError(#[from] BlobsSetupError),
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn state(username: &str, password: &str) -> State {
        let config = Config {
            username: username.to_string(),
            password: password.to_string(),
            ..Config::default()
        };
        State::from_config(&config).await.unwrap()
    }

    #[test]
    fn test_unset_credentials_match_nothing() {
        let creds = Credentials::new("", "");
        assert!(!creds.matches("", ""));
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::new("admin", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_authorize() {
        let state = state("admin", "secret").await;

        assert!(state.authorize("10.0.0.1", Some(("admin", "secret"))).is_ok());
        assert_eq!(state.guard().tracked(), 0);

        assert_eq!(
            state.authorize("10.0.0.1", Some(("admin", "wrong"))),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(state.guard().tracked(), 1);
    }

    #[tokio::test]
    async fn test_missing_credentials_are_not_failures() {
        let state = state("admin", "secret").await;

        for _ in 0..10 {
            assert_eq!(
                state.authorize("10.0.0.3", None),
                Err(AuthError::MissingCredentials)
            );
        }
        assert_eq!(state.guard().tracked(), 0);
        assert!(state.authorize("10.0.0.3", Some(("admin", "secret"))).is_ok());
    }

    #[tokio::test]
    async fn test_authorize_blocks_after_repeated_failures() {
        let state = state("admin", "secret").await;

        for _ in 0..4 {
            let _ = state.authorize("10.0.0.2", Some(("admin", "nope")));
        }
        assert!(matches!(
            state.authorize("10.0.0.2", Some(("admin", "secret"))),
            Err(AuthError::Blocked { .. })
        ));
    }
}
