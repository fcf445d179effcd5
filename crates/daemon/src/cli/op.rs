use std::error::Error;
use std::path::PathBuf;

use url::Url;

use void_daemon::http_server::api::client::{ApiClient, ApiError};
use void_daemon::state::{AppState, DEFAULT_PORT};

/// Resolve the remote URL for the API client.
///
/// Priority: explicit `--remote` flag > config file `port` > default port.
pub fn resolve_remote(
    explicit: Option<Url>,
    config_path: Option<PathBuf>,
) -> Result<Url, url::ParseError> {
    if let Some(url) = explicit {
        return Ok(url);
    }
    let port = AppState::load(config_path)
        .map(|state| state.config.port)
        .unwrap_or(DEFAULT_PORT);
    Url::parse(&format!("http://localhost:{}", port))
}

/// Resolve Basic credentials.
///
/// Flags (or `VOID_USER` / `VOID_PASS`) win; otherwise the local config's
/// credentials are used when it has any.
pub fn resolve_credentials(
    user: Option<String>,
    pass: Option<String>,
    config_path: Option<PathBuf>,
) -> Option<(String, String)> {
    if let Some(user) = user {
        return Some((user, pass.unwrap_or_default()));
    }
    let config = AppState::load(config_path).ok()?.config;
    if config.username.is_empty() && config.password.is_empty() {
        return None;
    }
    Some((config.username, config.password))
}

#[derive(Clone)]
pub struct OpContext {
    /// API client (always initialized with default or custom URL)
    pub client: ApiClient,
    /// Optional custom config path (defaults to ~/.void)
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    /// Create context with custom remote URL and optional config path
    pub fn new(
        remote: Url,
        config_path: Option<PathBuf>,
        credentials: Option<(String, String)>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new(&remote, credentials)?,
            config_path,
        })
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($( $(#[$meta:meta])* ($variant:ident, $type:ty) ),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $( $(#[$meta])* $variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use void_daemon::AppConfig;

    use super::*;

    #[test]
    fn test_resolve_remote_explicit_wins() {
        let explicit = Url::parse("http://example.com:9999").unwrap();
        let result = resolve_remote(Some(explicit.clone()), None).unwrap();
        assert_eq!(result, explicit);
    }

    #[test]
    fn test_resolve_remote_falls_back_to_default() {
        let result = resolve_remote(None, Some(PathBuf::from("/nonexistent"))).unwrap();
        assert_eq!(result.as_str(), "http://localhost:8088/");
    }

    #[test]
    fn test_resolve_remote_uses_config_port() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("void");
        let config = AppConfig {
            port: 9191,
            ..AppConfig::default()
        };
        AppState::init(Some(dir.clone()), Some(config)).unwrap();

        let result = resolve_remote(None, Some(dir)).unwrap();
        assert_eq!(result.port(), Some(9191));
    }

    #[test]
    fn test_resolve_credentials_flags_win() {
        let creds = resolve_credentials(
            Some("alice".to_string()),
            None,
            Some(PathBuf::from("/nonexistent")),
        );
        assert_eq!(creds, Some(("alice".to_string(), String::new())));
    }

    #[test]
    fn test_resolve_credentials_from_config() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("void");
        let config = AppConfig {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
            ..AppConfig::default()
        };
        AppState::init(Some(dir.clone()), Some(config)).unwrap();

        assert_eq!(
            resolve_credentials(None, None, Some(dir)),
            Some(("admin".to_string(), "hunter2".to_string()))
        );
    }

    #[test]
    fn test_resolve_credentials_none_configured() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("void");
        AppState::init(Some(dir.clone()), None).unwrap();

        assert_eq!(resolve_credentials(None, None, Some(dir)), None);
    }
}
