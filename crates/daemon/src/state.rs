use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "void";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "db.sqlite";
pub const BLOBS_DIR_NAME: &str = "blobs";
pub const DEFAULT_PORT: u16 = 8088;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Port for the HTTP server
    #[serde(default = "default_port")]
    pub port: u16,
    /// Basic auth username for privileged operations
    #[serde(default)]
    pub username: String,
    /// Basic auth password for privileged operations
    #[serde(default)]
    pub password: String,
    /// Allow allocate/confirm without credentials
    #[serde(default)]
    pub anonymous_put: bool,
    /// Upper bound on a single blob transfer, in seconds
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
    /// Where sealed file content is kept
    #[serde(default)]
    pub blob_store: BlobStoreConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_upload_timeout_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            username: String::new(),
            password: String::new(),
            anonymous_put: false,
            upload_timeout_secs: default_upload_timeout_secs(),
            blob_store: BlobStoreConfig::default(),
        }
    }
}

/// Configuration for the blob storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlobStoreConfig {
    /// Local filesystem storage
    #[serde(alias = "fs")]
    Filesystem {
        /// Path for blob storage (defaults to void_dir/blobs/)
        #[serde(default)]
        path: Option<PathBuf>,
    },

    /// In-memory storage, lost on restart
    Memory,

    /// S3-compatible object storage
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self::Filesystem { path: None }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the void directory (~/.void)
    pub void_dir: PathBuf,
    /// Path to the SQLite database
    pub db_path: PathBuf,
    /// Path to the blobs directory
    pub blobs_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the void directory path (custom or default ~/.void)
    pub fn void_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new void state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let void_dir = Self::void_dir(custom_path)?;

        if void_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&void_dir)?;

        let blobs_path = void_dir.join(BLOBS_DIR_NAME);
        fs::create_dir_all(&blobs_path)?;

        let config = config.unwrap_or_default();
        let config_path = void_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        // Schema is applied by the daemon on first start
        let db_path = void_dir.join(DB_FILE_NAME);
        fs::write(&db_path, "")?;

        Ok(Self {
            void_dir,
            db_path,
            blobs_path,
            config_path,
            config,
        })
    }

    /// Load existing state from void directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let void_dir = Self::void_dir(custom_path)?;

        if !void_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let db_path = void_dir.join(DB_FILE_NAME);
        let blobs_path = void_dir.join(BLOBS_DIR_NAME);
        let config_path = void_dir.join(CONFIG_FILE_NAME);

        if !db_path.exists() {
            return Err(StateError::MissingFile(DB_FILE_NAME.to_string()));
        }
        if !blobs_path.exists() {
            return Err(StateError::MissingFile(format!("{}/", BLOBS_DIR_NAME)));
        }
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            void_dir,
            db_path,
            blobs_path,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("void directory not initialized. Run 'void init' first")]
    NotInitialized,

    #[error("void directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
