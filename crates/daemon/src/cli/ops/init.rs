use clap::Args;

use void_daemon::state::{AppConfig, AppState, BlobStoreConfig, StateError, DEFAULT_PORT};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Port the daemon listens on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Basic auth username for privileged operations
    #[arg(long, default_value = "")]
    pub username: String,

    /// Basic auth password for privileged operations
    #[arg(long, default_value = "")]
    pub password: String,

    /// Allow allocate/confirm without credentials
    #[arg(long)]
    pub anonymous_put: bool,

    /// Directory for blob content (defaults to <config dir>/blobs)
    #[arg(long)]
    pub blobs_path: Option<std::path::PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            anonymous_put: self.anonymous_put,
            blob_store: BlobStoreConfig::Filesystem {
                path: self.blobs_path.clone(),
            },
            ..AppConfig::default()
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let auth = if state.config.username.is_empty() && state.config.password.is_empty() {
            "not configured (privileged requests will be rejected)"
        } else {
            "configured"
        };

        let output = format!(
            "Initialized void directory at: {}\n\
             - Database: {}\n\
             - Blobs: {}\n\
             - Config: {}\n\
             - Port: {}\n\
             - Credentials: {}\n\
             - Anonymous PUT: {}",
            state.void_dir.display(),
            state.db_path.display(),
            self.blobs_path
                .as_ref()
                .unwrap_or(&state.blobs_path)
                .display(),
            state.config_path.display(),
            state.config.port,
            auth,
            state.config.anonymous_put,
        );

        Ok(output)
    }
}
