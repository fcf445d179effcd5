use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Url};

use super::{presented, transfer, BasicAuth, ClientIp, VoidError};
use crate::http_server::api::client::{void_url, ApiRequest};
use crate::models::UploadResponse;
use crate::ServiceState;

const FILE_FIELD: &str = "file";

pub async fn handler(
    State(state): State<ServiceState>,
    ClientIp(ip): ClientIp,
    auth: BasicAuth,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, VoidError> {
    state.authorize(&ip, presented(&auth))?;

    let mut multipart = multipart
        .map_err(|e| VoidError::Validation(format!("uploaded file contains error: {}", e)))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| VoidError::Validation(format!("uploaded file contains error: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            tracing::debug!(field = ?field.name(), "ignoring multipart field");
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unnamed".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| VoidError::Validation(format!("uploaded file contains error: {}", e)))?;

        upload = Some((filename, data));
        break;
    }

    let (filename, data) = upload.ok_or_else(|| {
        VoidError::Validation(format!("uploaded file contains error: missing '{}' field", FILE_FIELD))
    })?;

    let coordinator = state.coordinator().clone();
    let name = filename.clone();
    let record = transfer(state.upload_timeout(), move |cancel| async move {
        coordinator.direct_upload(&name, data, &cancel).await
    })
    .await?;

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            id: record.id,
            message: format!("Upload file {} success.", filename),
        }),
    )
        .into_response())
}

/// Upload `data` as `filename` and commit it in one step.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub data: Bytes,
}

impl ApiRequest for UploadRequest {
    type Response = UploadResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        let part = Part::stream(self.data).file_name(self.filename);
        let form = Form::new().part(FILE_FIELD, part);
        client.post(void_url(base_url)).multipart(form)
    }
}
