use std::time::Duration;

use clap::Args;

use void_daemon::state::{AppState, StateError};
use void_daemon::{spawn_service, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Override server port (default from config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory for log files (logs to stdout only if not set)
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        // Load state from config path (or default ~/.void)
        let state = AppState::load(ctx.config_path.clone())?;

        let config = ServiceConfig {
            blob_store: state.config.blob_store.clone(),
            void_dir: state.void_dir.clone(),
            port: self.port.unwrap_or(state.config.port),
            username: state.config.username.clone(),
            password: state.config.password.clone(),
            anonymous_put: state.config.anonymous_put,
            upload_timeout: Duration::from_secs(state.config.upload_timeout_secs),
            sqlite_path: Some(state.db_path),
            log_level: tracing::Level::DEBUG,
            log_dir: self.log_dir.clone(),
        };

        spawn_service(&config).await;
        Ok("daemon ended".to_string())
    }
}
