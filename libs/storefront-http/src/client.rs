use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::{HttpResponse, read_body_limited};
use crate::transport::HttpTransport;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use std::fmt;
use std::time::Duration;
use tower::ServiceExt;
use tower::util::BoxCloneSyncService;

/// Type-erased tower stack sitting on top of the hyper client.
pub(crate) type InnerService = BoxCloneSyncService<Request<Full<Bytes>>, Response<Incoming>, HttpError>;

/// HTTP client over a tower middleware stack (timeout, user agent) and a
/// pooled hyper connection manager.
///
/// `HttpClient` is `Clone + Send + Sync`; cloning is cheap and clones share
/// the connection pool.
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: InnerService,
    pub(crate) max_body_size: usize,
    pub(crate) request_timeout: Duration,
    pub(crate) transport_security: TransportSecurity,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_body_size", &self.max_body_size)
            .field("request_timeout", &self.request_timeout)
            .field("transport_security", &self.transport_security)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, HttpError> {
        HttpClientBuilder::new().build()
    }

    /// Create a builder for configuring the HTTP client
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn execute(&self, request: Request<Bytes>) -> Result<HttpResponse, HttpError> {
        validate_uri(request.uri(), self.transport_security)?;

        let (parts, body) = request.into_parts();
        let request = Request::from_parts(parts, Full::new(body));

        tracing::trace!(method = %request.method(), uri = %request.uri(), "sending request");

        // One deadline for headers and body; the tower timeout only covers headers.
        let deadline = tokio::time::Instant::now() + self.request_timeout;
        let response = self.service.clone().oneshot(request).await?;
        let (parts, body) = response.into_parts();

        let body = tokio::time::timeout_at(deadline, read_body_limited(body, self.max_body_size))
            .await
            .map_err(|_| HttpError::Timeout(self.request_timeout))??;

        Ok(HttpResponse::new(parts.status, parts.headers, body))
    }
}

/// Validate an absolute URI against the transport security mode.
fn validate_uri(uri: &http::Uri, transport_security: TransportSecurity) -> Result<(), HttpError> {
    if uri.authority().is_none() {
        return Err(HttpError::InvalidUri {
            url: uri.to_string(),
            kind: InvalidUriKind::MissingAuthority,
            reason: "missing host/authority".to_owned(),
        });
    }

    match uri.scheme_str() {
        Some("https") => Ok(()),
        Some("http") => match transport_security {
            TransportSecurity::AllowInsecureHttp => Ok(()),
            TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                scheme: "http".to_owned(),
                reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
            }),
        },
        Some(scheme) => Err(HttpError::InvalidScheme {
            scheme: scheme.to_owned(),
            reason: "only http:// and https:// schemes are supported".to_owned(),
        }),
        None => Err(HttpError::InvalidUri {
            url: uri.to_string(),
            kind: InvalidUriKind::MissingScheme,
            reason: "missing scheme".to_owned(),
        }),
    }
}
