#[allow(clippy::module_inception)]
mod client;
mod error;

pub use client::{ApiClient, Download};
pub use error::ApiError;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

/// A request against the `/void` endpoint, built by the module that serves it.
pub trait ApiRequest {
    type Response: DeserializeOwned;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder;

    /// Decode a successful response body.
    fn parse_response(body: &[u8]) -> Result<Self::Response, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

/// The `/void` endpoint on `base_url`.
pub fn void_url(base_url: &Url) -> Url {
    let mut url = base_url.clone();
    url.set_path(crate::http_server::void::VOID_PATH);
    url.set_query(None);
    url
}
