use clap::Args;

use void_daemon::http_server::api::client::ApiError;
use void_daemon::http_server::void::ListRequest;

#[derive(Args, Debug, Clone)]
pub struct Ls;

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let files = ctx.client.call(ListRequest).await?;

        if files.is_empty() {
            return Ok("No files found".to_string());
        }

        Ok(files
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
