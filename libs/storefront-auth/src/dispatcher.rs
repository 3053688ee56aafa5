use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Request};
use storefront_http::{HttpResponse, HttpTransport};
use tracing::{debug, instrument};

use crate::config::AuthClientConfig;
use crate::endpoints::AuthEndpoints;
use crate::error::AuthError;
use crate::request::RequestDescriptor;
use crate::secret::SecretString;
use crate::session::SessionState;

/// A response together with the access credential it was sent with.
#[derive(Debug)]
pub struct Dispatched {
    pub response: HttpResponse,
    /// `None` for auth endpoints and when no session was active.
    pub credential: Option<SecretString>,
}

/// Turns a [`RequestDescriptor`] into an HTTP request, attaching the bearer
/// credential for every non-auth path, and sends it once.
#[derive(Clone)]
pub struct RequestDispatcher {
    transport: Arc<dyn HttpTransport>,
    config: Arc<AuthClientConfig>,
    endpoints: AuthEndpoints,
    session: SessionState,
}

impl fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("base_url", &self.config.base_url)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

fn bearer(credential: &SecretString) -> Result<HeaderValue, AuthError> {
    let mut value = HeaderValue::try_from(format!("Bearer {}", credential.expose()))
        .map_err(|_| AuthError::InvalidRequest("access credential is not a valid header value".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

impl RequestDispatcher {
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: Arc<AuthClientConfig>,
        session: SessionState,
    ) -> Self {
        let endpoints = AuthEndpoints::from_config(&config);
        Self {
            transport,
            config,
            endpoints,
            session,
        }
    }

    #[must_use]
    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    /// Send with the session's current access credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Transport`] when no response was obtained and
    /// [`AuthError::InvalidRequest`] when the request could not be built.
    pub async fn dispatch(&self, request: &RequestDescriptor) -> Result<Dispatched, AuthError> {
        let credential = self.session.access_credential();
        self.dispatch_with(request, credential).await
    }

    /// Send with an explicit access credential (used for replays).
    ///
    /// The credential is ignored for auth endpoints.
    ///
    /// # Errors
    ///
    /// Same as [`dispatch`](Self::dispatch).
    #[instrument(skip_all, fields(method = %request.method(), path = %request.path()))]
    pub async fn dispatch_with(
        &self,
        request: &RequestDescriptor,
        credential: Option<SecretString>,
    ) -> Result<Dispatched, AuthError> {
        let credential = if self.endpoints.is_auth(request.path()) {
            None
        } else {
            credential
        };

        let http_request = self.build(request, credential.as_ref())?;
        let response = self.transport.execute(http_request).await?;
        debug!(status = %response.status(), authenticated = credential.is_some(), "response received");
        Ok(Dispatched {
            response,
            credential,
        })
    }

    fn build(
        &self,
        request: &RequestDescriptor,
        credential: Option<&SecretString>,
    ) -> Result<Request<Bytes>, AuthError> {
        let url = self.config.url_for(request.path())?;
        let mut builder = Request::builder()
            .method(request.method().as_http())
            .uri(url);

        let headers = builder
            .headers_mut()
            .ok_or_else(|| AuthError::InvalidRequest("invalid request line".into()))?;
        for (name, value) in request.headers() {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| AuthError::InvalidRequest(format!("header name '{name}': {e}")))?;
            if name == AUTHORIZATION {
                continue;
            }
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| AuthError::InvalidRequest(format!("header '{name}': {e}")))?;
            headers.append(name, value);
        }
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }

        let body = match request.payload() {
            Some(payload) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Bytes::from(
                    serde_json::to_vec(payload)
                        .map_err(|e| AuthError::InvalidRequest(format!("payload encoding: {e}")))?,
                )
            }
            None => Bytes::new(),
        };

        if let Some(credential) = credential {
            headers.insert(AUTHORIZATION, bearer(credential)?);
        }

        builder
            .body(body)
            .map_err(|e| AuthError::InvalidRequest(e.to_string()))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::store::MemoryCredentialStore;
    use async_trait::async_trait;
    use http::StatusCode;
    use parking_lot::Mutex;
    use serde_json::json;
    use storefront_http::HttpError;
    use url::Url;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Request<Bytes>>>);

    #[async_trait]
    impl HttpTransport for Recorder {
        async fn execute(&self, request: Request<Bytes>) -> Result<HttpResponse, HttpError> {
            self.0.lock().push(request);
            Ok(HttpResponse::empty(StatusCode::OK))
        }
    }

    async fn dispatcher(recorder: Arc<Recorder>) -> RequestDispatcher {
        let config = AuthClientConfig::new(Url::parse("https://api.shop.test/v1").unwrap());
        let session = SessionState::new(Arc::new(MemoryCredentialStore::new()));
        session
            .write(Session::new(SecretString::new("a1"), SecretString::new("r1")))
            .await
            .unwrap();
        RequestDispatcher::new(recorder, Arc::new(config), session)
    }

    #[tokio::test]
    async fn attaches_bearer_to_resource_calls() {
        let recorder = Arc::new(Recorder::default());
        let d = dispatcher(recorder.clone()).await;

        let out = d.dispatch(&RequestDescriptor::get("/orders?page=2")).await.unwrap();
        assert_eq!(out.credential.unwrap().expose(), "a1");

        let seen = recorder.0.lock();
        assert_eq!(seen[0].uri(), "https://api.shop.test/v1/orders?page=2");
        let auth = seen[0].headers().get(AUTHORIZATION).unwrap();
        assert_eq!(auth, "Bearer a1");
        assert!(auth.is_sensitive());
    }

    #[tokio::test]
    async fn skips_bearer_on_auth_paths() {
        let recorder = Arc::new(Recorder::default());
        let d = dispatcher(recorder.clone()).await;

        for path in ["/auth/login", "/auth/register/", "/auth/refresh"] {
            let out = d.dispatch(&RequestDescriptor::post(path)).await.unwrap();
            assert!(out.credential.is_none());
        }
        assert!(
            recorder
                .0
                .lock()
                .iter()
                .all(|r| r.headers().get(AUTHORIZATION).is_none())
        );
    }

    #[tokio::test]
    async fn no_session_means_no_header() {
        let recorder = Arc::new(Recorder::default());
        let d = dispatcher(recorder.clone()).await;
        d.session.clear().await.unwrap();

        let out = d.dispatch(&RequestDescriptor::get("/orders")).await.unwrap();
        assert!(out.credential.is_none());
        assert!(recorder.0.lock()[0].headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn explicit_credential_wins_for_replay() {
        let recorder = Arc::new(Recorder::default());
        let d = dispatcher(recorder.clone()).await;
        d.dispatch_with(&RequestDescriptor::get("/orders"), Some(SecretString::new("a2")))
            .await
            .unwrap();
        assert_eq!(recorder.0.lock()[0].headers()[AUTHORIZATION], "Bearer a2");
    }

    #[tokio::test]
    async fn encodes_payload_and_caller_headers() {
        let recorder = Arc::new(Recorder::default());
        let d = dispatcher(recorder.clone()).await;
        let req = RequestDescriptor::put("/products/7")
            .with_payload(json!({"price": 1200}))
            .with_header("If-Match", "\"v3\"");
        d.dispatch(&req).await.unwrap();

        let seen = recorder.0.lock();
        assert_eq!(seen[0].method(), http::Method::PUT);
        assert_eq!(seen[0].headers()[CONTENT_TYPE], "application/json");
        assert_eq!(seen[0].headers()["if-match"], "\"v3\"");
        let body: serde_json::Value = serde_json::from_slice(seen[0].body()).unwrap();
        assert_eq!(body, json!({"price": 1200}));
    }

    #[tokio::test]
    async fn bad_header_is_invalid_request() {
        let recorder = Arc::new(Recorder::default());
        let d = dispatcher(recorder.clone()).await;
        let err = d
            .dispatch(&RequestDescriptor::get("/orders").with_header("bad header", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest(_)));
        assert!(recorder.0.lock().is_empty());
    }
}
