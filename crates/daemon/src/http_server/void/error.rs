use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::abuse_guard::AuthError;
use crate::blobs::TransportError;
use crate::coordinator::CoordinatorError;
use crate::database::StoreError;

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VoidError {
    #[error("request unauthorized: {0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("storage failed: {0}")]
    ExternalStorage(#[from] TransportError),

    #[error("metadata store: {0}")]
    Store(#[from] StoreError),

    #[error("{0} is not supported")]
    UnsupportedMethod(Method),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoordinatorError> for VoidError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Validation(msg) => VoidError::Validation(msg),
            e @ (CoordinatorError::NotFound(_) | CoordinatorError::Expired(_)) => {
                VoidError::NotFound(e.to_string())
            }
            CoordinatorError::Storage(e) => VoidError::ExternalStorage(e),
            CoordinatorError::Store(e) => VoidError::Store(e),
            e @ (CoordinatorError::Id(_)
            | CoordinatorError::Key(_)
            | CoordinatorError::SizeMismatch { .. }) => {
                VoidError::Internal(e.to_string())
            }
        }
    }
}

impl VoidError {
    pub fn status(&self) -> StatusCode {
        match self {
            VoidError::Auth(_) => StatusCode::UNAUTHORIZED,
            VoidError::Validation(_) | VoidError::UnsupportedMethod(_) => StatusCode::BAD_REQUEST,
            VoidError::NotFound(_) => StatusCode::NOT_FOUND,
            VoidError::ExternalStorage(_) => StatusCode::BAD_GATEWAY,
            VoidError::Store(_) | VoidError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for VoidError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = Json(ErrorBody {
            message: self.to_string(),
        });

        match self {
            VoidError::Auth(_) => (
                status,
                [(header::WWW_AUTHENTICATE, r#"Basic realm="void""#)],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            VoidError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            VoidError::from(CoordinatorError::Expired("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            VoidError::from(CoordinatorError::Validation("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            VoidError::from(CoordinatorError::Storage(TransportError::Cancelled)).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            VoidError::from(CoordinatorError::SizeMismatch {
                id: "x".into(),
                expected: 4,
                actual: 3,
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_error_challenges() {
        let response = VoidError::from(AuthError::MissingCredentials).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            r#"Basic realm="void""#
        );
    }
}
