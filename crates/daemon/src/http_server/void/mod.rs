//! The `/void` endpoint, routed by method.
//!
//! | method | query / body                  | auth          | action                       |
//! |--------|-------------------------------|---------------|------------------------------|
//! | PUT    | `{filename, filesize}`        | unless anon   | reserve an id and key        |
//! | PUT    | `{id, upload_id}`             | unless anon   | confirm a reservation        |
//! | POST   | multipart `file`              | yes           | upload and commit directly   |
//! | GET    | `?id=&mode=data`              | yes           | record metadata as JSON      |
//! | GET    | `?id=`                        | no            | download the file            |
//! | GET    | `?mode=data`                  | yes           | every record as JSON         |
//! | GET    |                               | no            | HTML listing                 |
//! | DELETE | `?id=`                        | yes           | remove a record              |

use std::future::Future;
use std::time::Duration;

use axum::extract::Request;
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use tokio_util::sync::{CancellationToken, DropGuard};

mod client_ip;
mod delete;
mod error;
mod get;
mod listing;
mod post;
mod put;

pub use client_ip::{read_ip, ClientIp};
pub use delete::DeleteParams;
pub use error::{ErrorBody, VoidError};
pub use get::{ListRequest, MetadataRequest};
pub use post::UploadRequest;
pub use put::{AllocateRequest, ConfirmRequest};

use crate::coordinator::CoordinatorError;
use crate::ServiceState;

pub const VOID_PATH: &str = "/void";

pub type BasicAuth = Option<TypedHeader<Authorization<Basic>>>;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route(
            VOID_PATH,
            get(get::handler)
                .put(put::handler)
                .post(post::handler)
                .delete(delete::handler)
                .fallback(unsupported_method),
        )
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}

async fn unsupported_method(method: Method) -> VoidError {
    VoidError::UnsupportedMethod(method)
}

async fn access_log(ClientIp(ip): ClientIp, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();

    let response = next.run(request).await;

    tracing::info!(
        ip = %ip,
        method = %method,
        path = %path,
        query = %query,
        status = response.status().as_u16(),
        "void request"
    );
    response
}

/// Username and password from a Basic `Authorization` header, if present.
fn presented(auth: &BasicAuth) -> Option<(&str, &str)> {
    auth.as_ref()
        .map(|TypedHeader(basic)| (basic.username(), basic.password()))
}

/// Run a blob transfer on its own task.
///
/// The token handed to `op` is cancelled when `limit` passes or when the
/// request future is dropped, so the transfer can clean up after itself even
/// if nobody is waiting for it anymore.
async fn transfer<T, F, Fut>(limit: Duration, op: F) -> Result<T, VoidError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, CoordinatorError>> + Send + 'static,
    T: Send + 'static,
{
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let fut = op(cancel.clone());
    let task = tokio::spawn(async move {
        tokio::pin!(fut);
        tokio::select! {
            result = &mut fut => result,
            _ = tokio::time::sleep(limit) => {
                tracing::warn!(limit_secs = limit.as_secs(), "transfer timed out");
                cancel.cancel();
                fut.await
            }
        }
    });

    let result = task
        .await
        .map_err(|e| VoidError::Internal(format!("transfer task failed: {}", e)))?;
    Ok(result?)
}

/// Cancel `cancel` once `limit` passes.
///
/// Dropping the returned guard cancels it as well. A streamed response body
/// holds the guard, so a client that goes away stops the transfer.
fn deadline(limit: Duration, cancel: CancellationToken) -> DropGuard {
    let timer = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = tokio::time::sleep(limit) => {
                tracing::warn!(limit_secs = limit.as_secs(), "transfer timed out");
                timer.cancel();
            }
        }
    });
    cancel.drop_guard()
}
