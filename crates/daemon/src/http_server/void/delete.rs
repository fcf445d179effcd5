use axum::extract::{Query, State};
use axum::http::StatusCode;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use super::{presented, BasicAuth, ClientIp, VoidError};
use crate::http_server::api::client::{void_url, ApiRequest};
use crate::ServiceState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub id: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    ClientIp(ip): ClientIp,
    auth: BasicAuth,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, VoidError> {
    state.authorize(&ip, presented(&auth))?;
    state.coordinator().delete(&params.id).await?;
    Ok(StatusCode::OK)
}

impl ApiRequest for DeleteParams {
    type Response = ();

    fn build_request(self, base_url: &Url, client: &Client) -> RequestBuilder {
        client.delete(void_url(base_url)).query(&self)
    }

    fn parse_response(_body: &[u8]) -> Result<(), serde_json::Error> {
        Ok(())
    }
}
