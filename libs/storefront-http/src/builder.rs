use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tower::util::BoxCloneSyncService;
use tower::{ServiceBuilder, ServiceExt, timeout::TimeoutLayer};

use crate::HttpClient;
use crate::config::{HttpClientConfig, TlsRootConfig, TransportSecurity};
use crate::error::HttpError;
use crate::layers::UserAgentLayer;
use crate::tls;

/// Assembles an [`HttpClient`] from an [`HttpClientConfig`] plus overrides.
#[derive(Debug, Clone, Default)]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. one loaded from a config file.
    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    /// Deadline for a whole exchange: connect, headers and body.
    #[must_use]
    pub fn timeout(mut self, request_timeout: Duration) -> Self {
        self.config.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.config.user_agent = value.into();
        self
    }

    /// Cap on buffered response bodies, in bytes.
    #[must_use]
    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.config.max_body_size = limit;
        self
    }

    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Allow plain `http://` URLs.
    ///
    /// Only available in debug builds or with the `allow-insecure-http` feature;
    /// release configs must opt in explicitly through [`HttpClientConfig::transport`].
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    #[must_use]
    pub fn allow_insecure_http(mut self) -> Self {
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Wire the connection pool, the TLS connector and the tower layers together.
    ///
    /// # Errors
    /// Fails when the TLS roots cannot be loaded or the configured
    /// user agent is not a legal header value.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let HttpClientConfig {
            request_timeout,
            max_body_size,
            user_agent,
            transport,
            tls_roots,
            pool_idle_timeout,
            pool_max_idle_per_host,
        } = self.config;

        if transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "plain http:// is allowed for this client; credentials may travel unencrypted"
            );
        }

        let connector = https_connector(tls_roots, transport)?;
        let user_agent = UserAgentLayer::try_new(&user_agent)?;

        let mut pool = Client::builder(TokioExecutor::new());
        // idle eviction needs a timer
        pool.pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(pool_max_idle_per_host);
        if let Some(idle) = pool_idle_timeout {
            pool.pool_idle_timeout(idle);
        }
        let hyper = pool.build::<_, Full<Bytes>>(connector);

        // outermost first: deadline, then User-Agent, then the pool
        let stack = ServiceBuilder::new()
            .layer(TimeoutLayer::new(request_timeout))
            .layer(user_agent)
            .service(hyper)
            .map_err(move |e: tower::BoxError| classify_tower_error(e, request_timeout));

        Ok(HttpClient {
            service: BoxCloneSyncService::new(stack),
            max_body_size,
            request_timeout,
            transport_security: transport,
        })
    }
}

/// Turn the boxed errors tower hands back into [`HttpError`].
fn classify_tower_error(err: tower::BoxError, deadline: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return HttpError::Timeout(deadline);
    }
    err.downcast::<HttpError>()
        .map_or_else(HttpError::Transport, |inner| *inner)
}

/// HTTPS connector over the chosen trust anchors, negotiating h2 or http/1.1.
fn https_connector(
    roots: TlsRootConfig,
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let with_roots = match roots {
        TlsRootConfig::WebPki => HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(tls::get_crypto_provider())
            .map_err(|e| HttpError::Tls(Box::new(e)))?,
        TlsRootConfig::Native => HttpsConnectorBuilder::new().with_tls_config(
            tls::native_roots_client_config().map_err(|e| HttpError::Tls(e.into()))?,
        ),
    };

    Ok(match transport {
        TransportSecurity::AllowInsecureHttp => {
            with_roots.https_or_http().enable_all_versions().build()
        }
        TransportSecurity::TlsOnly => with_roots.https_only().enable_all_versions().build(),
    })
}
