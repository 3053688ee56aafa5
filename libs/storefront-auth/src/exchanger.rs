use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderValue, Request};
use serde::Deserialize;
use storefront_http::{HttpError, HttpTransport};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{ExpiryCause, format_http_error};
use crate::secret::SecretString;

/// Credentials issued by a successful refresh.
#[derive(Clone)]
pub struct RefreshGrant {
    pub access: SecretString,
    /// Rotated refresh credential. `None` means keep the current one.
    pub refresh: Option<SecretString>,
}

impl fmt::Debug for RefreshGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshGrant")
            .field("access", &"[REDACTED]")
            .field("rotated", &self.refresh.is_some())
            .finish()
    }
}

/// Exchanges a refresh credential for a new access credential.
///
/// Implementations perform one attempt and never retry.
#[async_trait]
pub trait RefreshExchanger: Send + Sync {
    /// # Errors
    ///
    /// Returns the [`ExpiryCause`] that ends the session.
    async fn exchange(&self, refresh: &SecretString) -> Result<RefreshGrant, ExpiryCause>;
}

/// `{accessToken, refreshToken?}` as returned by the login, register and
/// refresh endpoints.
#[derive(Deserialize)]
pub(crate) struct TokenPairResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
}

impl TokenPairResponse {
    /// Reject an empty access credential and treat an empty refresh
    /// credential as absent.
    pub(crate) fn into_grant(self) -> Result<RefreshGrant, String> {
        let access = Zeroizing::new(self.access_token);
        let refresh = self.refresh_token.map(Zeroizing::new);
        if access.is_empty() {
            return Err("accessToken is empty".into());
        }
        Ok(RefreshGrant {
            access: SecretString::new(access.as_str()),
            refresh: refresh
                .filter(|r| !r.is_empty())
                .map(|r| SecretString::new(r.as_str())),
        })
    }
}

/// Calls the refresh endpoint over HTTP.
///
/// Sends `POST {"refreshToken": ...}` without an `Authorization` header.
pub struct HttpRefreshExchanger {
    transport: Arc<dyn HttpTransport>,
    url: String,
}

impl fmt::Debug for HttpRefreshExchanger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRefreshExchanger")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl HttpRefreshExchanger {
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_request(&self, refresh: &SecretString) -> Result<Request<Bytes>, ExpiryCause> {
        let body = Zeroizing::new(
            serde_json::to_vec(&serde_json::json!({ "refreshToken": refresh.expose() }))
                .map_err(|e| ExpiryCause::InvalidResponse(format!("request encoding: {e}")))?,
        );
        Request::post(self.url.as_str())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .body(Bytes::copy_from_slice(&body))
            .map_err(|e| ExpiryCause::Transport(format_http_error(&HttpError::from(e), "refresh")))
    }
}

#[async_trait]
impl RefreshExchanger for HttpRefreshExchanger {
    async fn exchange(&self, refresh: &SecretString) -> Result<RefreshGrant, ExpiryCause> {
        let request = self.build_request(refresh)?;

        let response = self.transport.execute(request).await.map_err(|e| match e {
            HttpError::Timeout(after) => ExpiryCause::TimedOut(after),
            other => ExpiryCause::Transport(format_http_error(&other, "refresh")),
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "refresh endpoint rejected the refresh credential");
            return Err(ExpiryCause::Rejected(status));
        }

        let grant = response
            .json::<TokenPairResponse>()
            .map_err(|e| ExpiryCause::InvalidResponse(e.to_string()))?
            .into_grant()
            .map_err(ExpiryCause::InvalidResponse)?;
        debug!(rotated = grant.refresh.is_some(), "refresh endpoint issued new credentials");
        Ok(grant)
    }
}
