use async_trait::async_trait;
use bytes::Bytes;
use http::Request;

use crate::error::HttpError;
use crate::response::HttpResponse;

/// Something that can carry one HTTP request to a server and bring back the
/// buffered response.
///
/// Implementations return `Ok` for every HTTP status (4xx/5xx included) and
/// `Err` only when no response was obtained. They never retry.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute a single request.
    ///
    /// # Errors
    ///
    /// Returns an [`HttpError`] on invalid URLs, transport failures, timeouts
    /// or oversized bodies.
    async fn execute(&self, request: Request<Bytes>) -> Result<HttpResponse, HttpError>;
}
