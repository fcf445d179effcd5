use std::path::PathBuf;

use bytes::Bytes;
use clap::Args;

use void_daemon::http_server::api::client::{void_url, ApiError};
use void_daemon::http_server::void::UploadRequest;

#[derive(Args, Debug, Clone)]
pub struct Up {
    /// Files to upload
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0} is not a file")]
    NotAFile(PathBuf),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Up {
    type Error = UpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let endpoint = void_url(ctx.client.base_url());
        let mut lines = Vec::with_capacity(self.paths.len());

        for path in &self.paths {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| UpError::NotAFile(path.clone()))?;
            let data = tokio::fs::read(path).await.map_err(|source| UpError::Read {
                path: path.clone(),
                source,
            })?;

            let response = ctx
                .client
                .call(UploadRequest {
                    filename,
                    data: Bytes::from(data),
                })
                .await?;

            lines.push(format!("{}?id={}", endpoint, response.id));
        }

        Ok(lines.join("\n"))
    }
}
