use std::path::{Path, PathBuf};

use clap::Args;

use void_daemon::http_server::api::client::ApiError;
use void_daemon::http_server::void::MetadataRequest;

#[derive(Args, Debug, Clone)]
pub struct Down {
    /// Identifiers to download
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Directory to save into (defaults to the current directory)
    #[arg(long, short)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DownError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("{path} already exists")]
    Exists { path: PathBuf },
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Down {
    type Error = DownError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let dir = self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let mut lines = Vec::with_capacity(self.ids.len());

        for id in &self.ids {
            let metadata = ctx
                .client
                .call(MetadataRequest { id: id.clone() })
                .await?;

            let path = dir.join(local_name(&metadata.filename, id));
            if path.exists() {
                return Err(DownError::Exists { path });
            }

            let written = ctx.client.download(id).await?.save_to(&path).await?;
            lines.push(format!("{}\t{}\t{} bytes", id, path.display(), written));
        }

        Ok(lines.join("\n"))
    }
}

/// Last path component of the stored filename, or the id if there is none.
fn local_name(filename: &str, id: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name_strips_directories() {
        assert_eq!(local_name("../../etc/passwd", "abc"), "passwd");
        assert_eq!(local_name("notes.txt", "abc"), "notes.txt");
    }

    #[test]
    fn test_local_name_falls_back_to_id() {
        assert_eq!(local_name("", "abc"), "abc");
        assert_eq!(local_name("..", "abc"), "abc");
        assert_eq!(local_name("/", "abc"), "abc");
    }
}
