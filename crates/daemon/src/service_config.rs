use std::path::PathBuf;
use std::time::Duration;

use crate::state::BlobStoreConfig;

#[derive(Debug, Clone)]
pub struct Config {
    // blob store configuration
    /// Blob storage backend configuration
    pub blob_store: BlobStoreConfig,
    /// Path to the void directory (default location for blobs)
    pub void_dir: PathBuf,

    // http server configuration
    /// Port for the HTTP server
    pub port: u16,

    // auth
    /// Basic auth username for privileged operations
    pub username: String,
    /// Basic auth password for privileged operations
    pub password: String,
    /// Allow allocate/confirm without credentials
    pub anonymous_put: bool,
    /// Upper bound on a single blob transfer
    pub upload_timeout: Duration,

    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blob_store: BlobStoreConfig::Memory,
            void_dir: std::env::temp_dir(),
            port: 8088,
            username: String::new(),
            password: String::new(),
            anonymous_put: false,
            upload_timeout: Duration::from_secs(300),
            sqlite_path: None,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}
