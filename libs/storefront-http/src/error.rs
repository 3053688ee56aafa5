use std::time::Duration;
use thiserror::Error;

/// Which part of an absolute URL was absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    MissingAuthority,
    MissingScheme,
}

/// Everything that can go wrong between handing a request to the client and
/// holding a fully buffered response.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    #[error("request could not be assembled: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("bad header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("bad header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// No complete response arrived before the client's deadline.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Connect, read or protocol failure below HTTP semantics.
    #[error("connection failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("TLS setup failed: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("response body exceeds {limit} bytes (read {actual} so far)")]
    BodyTooLarge { limit: usize, actual: usize },

    /// Produced by [`HttpResponse::error_for_status`](crate::HttpResponse::error_for_status).
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus {
        status: http::StatusCode,
        body_preview: String,
        content_type: Option<String>,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// `reason` is for humans; branch on `kind`.
    #[error("unusable URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// The scheme is unsupported or forbidden by [`TransportSecurity`](crate::TransportSecurity).
    #[error("scheme '{scheme}' rejected: {reason}")]
    InvalidScheme { scheme: String, reason: String },
}

impl HttpError {
    /// `true` when the call never reached the server or no timely answer came back.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HttpError::Timeout(_) | HttpError::Transport(_) | HttpError::Tls(_)
        )
    }
}

impl From<hyper::Error> for HttpError {
    fn from(e: hyper::Error) -> Self {
        Self::Transport(e.into())
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(e: hyper_util::client::legacy::Error) -> Self {
        Self::Transport(e.into())
    }
}
