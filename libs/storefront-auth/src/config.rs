use std::time::Duration;

use serde::{Deserialize, Serialize};
use storefront_http::{HttpClientConfig, humantime_serde};
use url::Url;

use crate::error::AuthError;

/// Configuration for [`AuthenticatedClient`](crate::AuthenticatedClient).
///
/// Deserializable from YAML/env layers; durations are humantime strings
/// (`"15s"`). Call [`validate`](Self::validate) before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthClientConfig {
    /// Server origin plus optional path prefix. Request paths are appended to it.
    pub base_url: Option<Url>,

    pub login_path: String,
    pub register_path: String,
    pub refresh_path: String,

    /// Upper bound on one refresh exchange (default: 15 s). Elapsing counts
    /// as a failed refresh.
    #[serde(with = "humantime_serde")]
    pub refresh_timeout: Duration,

    /// Transport settings for business and login calls.
    pub http: HttpClientConfig,

    /// Transport settings for the refresh endpoint.
    /// When `None`, derived from `http`; see [`refresh_http_config`](Self::refresh_http_config).
    pub refresh_http: Option<HttpClientConfig>,
}

impl Default for AuthClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            login_path: "/auth/login".to_owned(),
            register_path: "/auth/register".to_owned(),
            refresh_path: "/auth/refresh".to_owned(),
            refresh_timeout: Duration::from_secs(15),
            http: HttpClientConfig::default(),
            refresh_http: None,
        }
    }
}

impl AuthClientConfig {
    /// Default settings pointed at `base_url`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: Some(base_url),
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if:
    /// - `base_url` is missing or cannot carry a path (e.g. `mailto:`),
    /// - an auth path is empty or does not start with `/`,
    /// - two auth paths are identical,
    /// - `refresh_timeout` is zero.
    pub fn validate(&self) -> Result<(), AuthError> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| AuthError::Config("base_url is required".into()))?;
        if base.cannot_be_a_base() {
            return Err(AuthError::Config(format!(
                "base_url '{base}' cannot be used as a base"
            )));
        }
        if base.query().is_some() || base.fragment().is_some() {
            return Err(AuthError::Config(
                "base_url must not contain a query or fragment".into(),
            ));
        }

        for (name, path) in [
            ("login_path", &self.login_path),
            ("register_path", &self.register_path),
            ("refresh_path", &self.refresh_path),
        ] {
            if !path.starts_with('/') {
                return Err(AuthError::Config(format!(
                    "{name} must start with '/', got '{path}'"
                )));
            }
        }

        let endpoints = crate::AuthEndpoints::from_config(self);
        if endpoints.login() == endpoints.register()
            || endpoints.login() == endpoints.refresh()
            || endpoints.register() == endpoints.refresh()
        {
            return Err(AuthError::Config(
                "login_path, register_path and refresh_path must differ".into(),
            ));
        }

        if self.refresh_timeout.is_zero() {
            return Err(AuthError::Config("refresh_timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Absolute URL for a request path.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] without a `base_url`, and
    /// [`AuthError::InvalidRequest`] if `path` does not start with `/`.
    pub fn url_for(&self, path: &str) -> Result<String, AuthError> {
        let base = self
            .base_url
            .as_ref()
            .ok_or_else(|| AuthError::Config("base_url is required".into()))?;
        if !path.starts_with('/') {
            return Err(AuthError::InvalidRequest(format!(
                "request path must start with '/', got '{path}'"
            )));
        }
        Ok(format!("{}{path}", base.as_str().trim_end_matches('/')))
    }

    /// Transport settings for the refresh exchange.
    ///
    /// Without an explicit `refresh_http`, the refresh client inherits `http`
    /// (transport security, TLS roots, user agent) and only tightens the
    /// timeout and body limit to the [`HttpClientConfig::refresh_endpoint()`]
    /// preset.
    #[must_use]
    pub fn refresh_http_config(&self) -> HttpClientConfig {
        if let Some(explicit) = &self.refresh_http {
            return explicit.clone();
        }
        let preset = HttpClientConfig::refresh_endpoint();
        HttpClientConfig {
            request_timeout: self.http.request_timeout.min(preset.request_timeout),
            max_body_size: self.http.max_body_size.min(preset.max_body_size),
            pool_max_idle_per_host: preset.pool_max_idle_per_host,
            ..self.http.clone()
        }
    }
}
