use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{deadline, listing, presented, BasicAuth, ClientIp, VoidError};
use crate::http_server::api::client::{void_url, ApiRequest};
use crate::models::Metadata;
use crate::ServiceState;

const DATA_MODE: &str = "data";

#[derive(Debug, Default, Deserialize)]
pub struct GetParams {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub mode: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    ClientIp(ip): ClientIp,
    auth: BasicAuth,
    Query(params): Query<GetParams>,
) -> Result<Response, VoidError> {
    let data_mode = params.mode == DATA_MODE;
    if data_mode {
        state.authorize(&ip, presented(&auth))?;
    }

    if params.id.is_empty() {
        let records = state.coordinator().list().await?;
        if data_mode {
            let all: Vec<Metadata> = records.iter().map(Metadata::from).collect();
            return Ok(Json(all).into_response());
        }
        return Ok(listing::render(&records));
    }

    let record = state.coordinator().get(&params.id).await?;
    if data_mode {
        return Ok(Json(Metadata::from(&record)).into_response());
    }

    let cancel = CancellationToken::new();
    let guard = deadline(state.upload_timeout(), cancel.clone());
    let stream = state.coordinator().download(&record, &cancel).await?;

    let id = record.id.clone();
    let body = Body::from_stream(stream.map(move |piece| {
        let _held = &guard;
        piece.inspect_err(|e| tracing::error!(id = %id, error = %e, "download aborted"))
    }));

    let disposition = HeaderValue::from_bytes(
        format!(
            "attachment; filename=\"{}\"",
            record.filename.replace(['"', '\\', '\r', '\n'], "_")
        )
        .as_bytes(),
    )
    .map_err(|e| VoidError::Internal(e.to_string()))?;
    let content_type = mime_guess::from_path(&record.filename).first_or_octet_stream();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::CONTENT_TYPE,
                HeaderValue::from_str(content_type.as_ref())
                    .unwrap_or(HeaderValue::from_static("application/octet-stream")),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(record.filesize)),
        ],
        body,
    )
        .into_response())
}

/// Metadata for a single committed record.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataRequest {
    pub id: String,
}

/// Metadata for every committed record.
#[derive(Debug, Clone, Default)]
pub struct ListRequest;

impl ApiRequest for MetadataRequest {
    type Response = Metadata;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client
            .get(void_url(base_url))
            .query(&[("id", self.id.as_str()), ("mode", DATA_MODE)])
    }
}

impl ApiRequest for ListRequest {
    type Response = Vec<Metadata>;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.get(void_url(base_url)).query(&[("mode", DATA_MODE)])
    }
}
