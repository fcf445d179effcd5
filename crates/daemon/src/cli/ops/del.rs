use clap::Args;

use void_daemon::http_server::api::client::ApiError;
use void_daemon::http_server::void::DeleteParams;

#[derive(Args, Debug, Clone)]
pub struct Del {
    /// Identifiers to delete
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DelError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Del {
    type Error = DelError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        for id in &self.ids {
            ctx.client.call(DeleteParams { id: id.clone() }).await?;
        }
        Ok(format!("deleted {}", self.ids.join(", ")))
    }
}
