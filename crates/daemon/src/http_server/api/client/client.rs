use std::path::Path;

use futures::StreamExt;
use reqwest::{header, Client, Response};
use tokio::io::AsyncWriteExt;
use url::Url;

use super::error::ApiError;
use super::{void_url, ApiRequest};
use crate::http_server::void::ErrorBody;

#[derive(Debug, Clone)]
pub struct ApiClient {
    pub remote: Url,
    client: Client,
    credentials: Option<(String, String)>,
}

impl ApiClient {
    pub fn new(remote: &Url, credentials: Option<(String, String)>) -> Result<Self, ApiError> {
        let client = Client::builder().build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
            credentials,
        })
    }

    pub async fn call<T: ApiRequest>(&self, request: T) -> Result<T::Response, ApiError> {
        let request_builder = self.authorize(request.build_request(&self.remote, &self.client));
        let response = check_status(request_builder.send().await?).await?;

        let body = response.bytes().await?;
        Ok(T::parse_response(&body)?)
    }

    /// Start downloading the content stored under `id`.
    pub async fn download(&self, id: &str) -> Result<Download, ApiError> {
        let request = self
            .client
            .get(void_url(&self.remote))
            .query(&[("id", id)]);
        let response = check_status(self.authorize(request).send().await?).await?;

        let filename = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_filename);

        Ok(Download { filename, response })
    }

    /// Get the base URL for API requests
    pub fn base_url(&self) -> &Url {
        &self.remote
    }

    /// Get the underlying HTTP client for custom requests
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, pass)) => request.basic_auth(user, Some(pass)),
            None => request,
        }
    }
}

/// A download in progress.
#[derive(Debug)]
pub struct Download {
    /// Filename the server suggested, if any
    pub filename: Option<String>,
    response: Response,
}

impl Download {
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Stream the body into a new file at `path`, returning the bytes written.
    pub async fn save_to(self, path: &Path) -> Result<u64, ApiError> {
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;

        let mut stream = self.response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await?;
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);
    Err(ApiError::HttpStatus(status, message))
}

fn attachment_filename(disposition: &str) -> Option<String> {
    disposition
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_filename() {
        assert_eq!(
            attachment_filename("attachment; filename=\"report.pdf\""),
            Some("report.pdf".to_string())
        );
        assert_eq!(
            attachment_filename("attachment;filename=plain.txt"),
            Some("plain.txt".to_string())
        );
        assert_eq!(attachment_filename("attachment"), None);
        assert_eq!(attachment_filename("attachment; filename=\"\""), None);
    }

    #[test]
    fn test_void_url_replaces_path_and_query() {
        let base = Url::parse("http://localhost:8088/some/where?x=1").unwrap();
        assert_eq!(void_url(&base).as_str(), "http://localhost:8088/void");
    }
}
