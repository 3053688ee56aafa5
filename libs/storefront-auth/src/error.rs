use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use serde::Deserialize;
use storefront_http::{HttpError, HttpResponse};
use thiserror::Error;

use crate::store::StoreError;

/// Why a session ended during credential refresh.
///
/// Cloned into every caller queued on the failed refresh, so the variants
/// carry rendered strings rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ExpiryCause {
    /// No refresh credential was stored; no exchange was attempted.
    #[error("no refresh credential available")]
    MissingRefreshCredential,

    /// The refresh endpoint answered with a non-success status.
    #[error("refresh rejected with HTTP {0}")]
    Rejected(StatusCode),

    /// The exchange did not settle within the refresh timeout.
    #[error("refresh timed out after {0:?}")]
    TimedOut(Duration),

    /// The refresh endpoint could not be reached.
    #[error("{0}")]
    Transport(String),

    /// The refresh endpoint answered 2xx with an unusable body.
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    /// The new credentials could not be written to the credential store.
    #[error("failed to persist refreshed credentials: {0}")]
    Persist(String),

    /// A replayed call was rejected again with the refreshed credential.
    #[error("replayed request rejected after refresh")]
    ReplayRejected,

    /// The session was logged out or replaced while the refresh ran; its
    /// result was discarded.
    #[error("session changed while the refresh was in flight")]
    Superseded,

    /// The refresh task ended without settling (runtime shutdown or panic).
    #[error("refresh aborted before completion")]
    Aborted,
}

/// A non-2xx response from a business endpoint.
///
/// Auth endpoints (login, register, refresh) also surface their 401s here,
/// since those are credential errors for the user, not expired sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    /// Machine-readable code from the error body, when the server sent one.
    pub code: Option<String>,
    pub message: String,
    pub body: Bytes,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiError {
    /// Build from a buffered response, reading `{code, message}` or
    /// `{error}` bodies when present.
    #[must_use]
    pub fn from_response(response: &HttpResponse) -> Self {
        let status = response.status();
        let parsed = serde_json::from_slice::<ErrorBody>(response.bytes()).ok();
        let code = parsed.as_ref().and_then(|b| b.code.clone());
        let message = parsed
            .and_then(|b| b.message.or(b.error))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_owned()
            });
        Self {
            status,
            code,
            message,
            body: response.bytes().clone(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "HTTP {} ({code}): {}", self.status, self.message),
            None => write!(f, "HTTP {}: {}", self.status, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// How a caller should react to an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// No response was obtained. Retrying later may help.
    Transport,
    /// The session is gone; the user must sign in again.
    TerminalAuth,
    /// The server answered with an error meant for the caller.
    Business,
    /// Local failure: bad request, storage, configuration.
    Internal,
}

/// Errors surfaced by the authenticated request layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The request never produced a response.
    #[error(transparent)]
    Transport(HttpError),

    /// Refresh failed or the replay was rejected. The session has been cleared.
    #[error("session expired: {0}")]
    SessionExpired(#[source] ExpiryCause),

    /// Non-2xx response from the server.
    #[error("{0}")]
    Api(#[source] ApiError),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A response body could not be read or decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    #[error("auth client config error: {0}")]
    Config(String),
}

impl AuthError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            AuthError::Transport(_) => ErrorClass::Transport,
            AuthError::SessionExpired(_) => ErrorClass::TerminalAuth,
            AuthError::Api(_) => ErrorClass::Business,
            AuthError::InvalidRequest(_)
            | AuthError::InvalidResponse(_)
            | AuthError::Store(_)
            | AuthError::Config(_) => ErrorClass::Internal,
        }
    }

    /// Status code of the server response behind this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AuthError::Api(api) => Some(api.status),
            _ => None,
        }
    }
}

impl From<ExpiryCause> for AuthError {
    fn from(cause: ExpiryCause) -> Self {
        AuthError::SessionExpired(cause)
    }
}

impl From<HttpError> for AuthError {
    fn from(err: HttpError) -> Self {
        if err.is_transport() {
            return AuthError::Transport(err);
        }
        match err {
            HttpError::BodyTooLarge { .. } | HttpError::Json(_) => {
                AuthError::InvalidResponse(err.to_string())
            }
            other => AuthError::InvalidRequest(other.to_string()),
        }
    }
}

/// Render an [`HttpError`] with a context prefix for logs and expiry causes.
///
/// Status errors keep only the status code; response bodies are left out.
#[must_use]
pub fn format_http_error(e: &HttpError, prefix: &str) -> String {
    match e {
        HttpError::HttpStatus { status, .. } => format!("{prefix} HTTP {status}"),
        HttpError::Json(err) => format!("{prefix} JSON parse failed: {err}"),
        HttpError::Timeout(duration) => {
            format!("{prefix} request timed out after {duration:?}")
        }
        HttpError::Transport(err) => format!("{prefix} transport error: {err}"),
        HttpError::Tls(err) => format!("{prefix} TLS error: {err}"),
        HttpError::BodyTooLarge { limit, actual } => {
            format!("{prefix} response too large: limit {limit} bytes, got {actual} bytes")
        }
        HttpError::RequestBuild(err) => format!("{prefix} request build failed: {err}"),
        HttpError::InvalidHeaderName(err) => format!("{prefix} invalid header name: {err}"),
        HttpError::InvalidHeaderValue(err) => format!("{prefix} invalid header value: {err}"),
        HttpError::InvalidUri { url, reason, .. } => {
            format!("{prefix} invalid URL '{url}': {reason}")
        }
        HttpError::InvalidScheme { scheme, reason } => {
            format!("{prefix} invalid scheme '{scheme}': {reason}")
        }
        _ => format!("{prefix} request failed"),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn api_error_reads_code_and_message() {
        let resp = HttpResponse::json_body(
            StatusCode::CONFLICT,
            &json!({"code": "SKU_TAKEN", "message": "sku already exists"}),
        );
        let err = ApiError::from_response(&resp);
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code.as_deref(), Some("SKU_TAKEN"));
        assert_eq!(err.message, "sku already exists");
        assert_eq!(err.to_string(), "HTTP 409 Conflict (SKU_TAKEN): sku already exists");
    }

    #[test]
    fn api_error_accepts_error_field() {
        let resp =
            HttpResponse::json_body(StatusCode::UNAUTHORIZED, &json!({"error": "bad password"}));
        let err = ApiError::from_response(&resp);
        assert_eq!(err.message, "bad password");
        assert!(err.code.is_none());
    }

    #[test]
    fn api_error_falls_back_to_reason_phrase() {
        let resp = HttpResponse::empty(StatusCode::SERVICE_UNAVAILABLE);
        let err = ApiError::from_response(&resp);
        assert_eq!(err.message, "Service Unavailable");
    }

    #[test]
    fn classes() {
        assert_eq!(
            AuthError::SessionExpired(ExpiryCause::ReplayRejected).class(),
            ErrorClass::TerminalAuth
        );
        assert_eq!(
            AuthError::Transport(HttpError::Timeout(Duration::from_secs(1))).class(),
            ErrorClass::Transport
        );
        let api = ApiError::from_response(&HttpResponse::empty(StatusCode::NOT_FOUND));
        assert_eq!(AuthError::Api(api).class(), ErrorClass::Business);
        assert_eq!(AuthError::Config("x".into()).class(), ErrorClass::Internal);
    }

    #[test]
    fn http_error_conversion_splits_transport_from_local_failures() {
        let timeout: AuthError = HttpError::Timeout(Duration::from_secs(2)).into();
        assert_eq!(timeout.class(), ErrorClass::Transport);

        let too_large: AuthError = HttpError::BodyTooLarge { limit: 1, actual: 2 }.into();
        assert!(matches!(too_large, AuthError::InvalidResponse(_)));

        let bad_scheme: AuthError = HttpError::InvalidScheme {
            scheme: "ftp".into(),
            reason: "nope".into(),
        }
        .into();
        assert!(matches!(bad_scheme, AuthError::InvalidRequest(_)));
    }

    #[test]
    fn format_http_error_excludes_body() {
        let err = HttpError::HttpStatus {
            status: StatusCode::BAD_GATEWAY,
            body_preview: "upstream stack trace".into(),
            content_type: None,
        };
        let msg = format_http_error(&err, "refresh");
        assert_eq!(msg, "refresh HTTP 502 Bad Gateway");
    }

    #[test]
    fn expiry_cause_renders() {
        assert_eq!(
            ExpiryCause::Rejected(StatusCode::UNAUTHORIZED).to_string(),
            "refresh rejected with HTTP 401 Unauthorized"
        );
        let err = AuthError::SessionExpired(ExpiryCause::MissingRefreshCredential);
        assert_eq!(err.to_string(), "session expired: no refresh credential available");
    }
}
