use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default User-Agent sent when the caller does not configure one.
pub const DEFAULT_USER_AGENT: &str = concat!("storefront-http/", env!("CARGO_PKG_VERSION"));

/// Where the client takes its trusted root certificates from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Bundled Mozilla roots, independent of the host OS
    #[default]
    WebPki,
    /// The platform certificate store
    Native,
}

/// Whether plain `http://` backends are reachable at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Only `https://` URLs are accepted
    #[default]
    TlsOnly,
    /// Allow insecure HTTP connections (local backends and mock servers only)
    AllowInsecureHttp,
}

/// Settings for one pooled storefront HTTP client.
///
/// Deserializable so it can sit inside layered application config; durations
/// are written as humantime strings (`"30s"`, `"2m"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpClientConfig {
    /// Per-request timeout, covering response headers and body (default: 30 seconds)
    #[serde(with = "crate::humantime_serde")]
    pub request_timeout: Duration,

    /// Response bodies larger than this many bytes are refused (10 MiB)
    pub max_body_size: usize,

    /// User-Agent header value
    pub user_agent: String,

    /// HTTPS enforcement, `tls_only` unless overridden
    pub transport: TransportSecurity,

    /// Trust anchors for TLS, bundled roots unless overridden
    pub tls_roots: TlsRootConfig,

    /// How long a pooled connection may sit unused (90s); `None` keeps hyper-util's own default
    #[serde(with = "crate::humantime_serde::option")]
    pub pool_idle_timeout: Option<Duration>,

    /// Upper bound on idle pooled connections to a single host
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 << 20,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl HttpClientConfig {
    /// Small footprint preset for one-shot tools such as the CLI.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 1 << 20,
            pool_idle_timeout: Some(Duration::from_secs(20)),
            pool_max_idle_per_host: 4,
            ..Self::default()
        }
    }

    /// Create configuration for the credential refresh endpoint.
    ///
    /// Refresh responses are tiny and the exchange sits on the critical path
    /// of every request waiting for a new credential, so the timeout is short.
    #[must_use]
    pub fn refresh_endpoint() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 64 << 10,
            pool_idle_timeout: Some(Duration::from_secs(60)),
            pool_max_idle_per_host: 2,
            ..Self::default()
        }
    }

    /// Preset for talking to a local mock backend over plain `http://`.
    ///
    /// Never point this at a real storefront: credentials would travel unencrypted.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            max_body_size: 1 << 20,
            transport: TransportSecurity::AllowInsecureHttp,
            pool_idle_timeout: Some(Duration::from_secs(5)),
            pool_max_idle_per_host: 2,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn default_is_tls_only() {
        let cfg = HttpClientConfig::default();
        assert_eq!(cfg.transport, TransportSecurity::TlsOnly);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.max_body_size, 10 * 1024 * 1024);
        assert!(cfg.user_agent.starts_with("storefront-http/"));
    }

    #[test]
    fn refresh_endpoint_preset_is_tighter_than_default() {
        let cfg = HttpClientConfig::refresh_endpoint();
        assert!(cfg.request_timeout < HttpClientConfig::default().request_timeout);
        assert_eq!(cfg.max_body_size, 64 * 1024);
        assert_eq!(cfg.transport, TransportSecurity::TlsOnly);
    }

    #[test]
    fn for_testing_allows_http() {
        let cfg = HttpClientConfig::for_testing();
        assert_eq!(cfg.transport, TransportSecurity::AllowInsecureHttp);
    }

    #[test]
    fn deserializes_partial_document_over_defaults() {
        let cfg: HttpClientConfig = serde_json::from_str(
            r#"{"request_timeout":"5s","transport":"allow_insecure_http","pool_idle_timeout":null}"#,
        )
        .unwrap();
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.transport, TransportSecurity::AllowInsecureHttp);
        assert_eq!(cfg.pool_idle_timeout, None);
        assert_eq!(cfg.pool_max_idle_per_host, 32);
    }

    #[test]
    fn rejects_unknown_fields() {
        let r: Result<HttpClientConfig, _> = serde_json::from_str(r#"{"retries":3}"#);
        assert!(r.is_err());
    }
}
