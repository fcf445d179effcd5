use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use super::{presented, BasicAuth, ClientIp, VoidError};
use crate::http_server::api::client::{void_url, ApiRequest};
use crate::models::Metadata;
use crate::ServiceState;

/// Either an allocation request (`filename`, `filesize`) or a confirmation
/// (`id`, `upload_id`). A non-empty `id` selects confirmation.
#[derive(Debug, Default, Deserialize)]
pub struct PutRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub upload_id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub filesize: i64,
}

pub async fn handler(
    State(state): State<ServiceState>,
    ClientIp(ip): ClientIp,
    auth: BasicAuth,
    body: Bytes,
) -> Result<Response, VoidError> {
    if !state.anonymous_put() {
        state.authorize(&ip, presented(&auth))?;
    }

    let request: PutRequest = serde_json::from_slice(&body)
        .map_err(|e| VoidError::Validation(format!("malformed request body: {}", e)))?;

    if !request.id.is_empty() {
        state
            .coordinator()
            .confirm(&request.id, &request.upload_id)
            .await?;
        return Ok(StatusCode::OK.into_response());
    }

    let pending = state
        .coordinator()
        .request_allocation(&request.filename, request.filesize)
        .await?;

    Ok((StatusCode::OK, Json(Metadata::from(&pending))).into_response())
}

/// Reserve an identifier and key for a file uploaded elsewhere.
#[derive(Debug, Clone, Serialize)]
pub struct AllocateRequest {
    pub filename: String,
    pub filesize: i64,
}

/// Promote a reservation once its content is stored under `upload_id`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmRequest {
    pub id: String,
    pub upload_id: String,
}

// Client implementation - builds request for this operation
impl ApiRequest for AllocateRequest {
    type Response = Metadata;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.put(void_url(base_url)).json(&self)
    }
}

impl ApiRequest for ConfirmRequest {
    type Response = ();

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.put(void_url(base_url)).json(&self)
    }

    fn parse_response(_body: &[u8]) -> Result<(), serde_json::Error> {
        Ok(())
    }
}
