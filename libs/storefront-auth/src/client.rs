use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use storefront_http::{HttpClientBuilder, HttpClientConfig, HttpResponse, HttpTransport};
use tracing::{info, instrument, warn};

use crate::config::AuthClientConfig;
use crate::coordinator::RefreshCoordinator;
use crate::dispatcher::RequestDispatcher;
use crate::error::{ApiError, AuthError};
use crate::exchanger::{HttpRefreshExchanger, RefreshExchanger, TokenPairResponse};
use crate::monitor::ResponseMonitor;
use crate::request::RequestDescriptor;
use crate::session::{Session, SessionState, SessionStatus};
use crate::store::{CredentialStore, MemoryCredentialStore};
use crate::traits::{LogoutHandler, NoopLogout};

/// Entry point for authenticated calls to the storefront API.
///
/// `AuthenticatedClient` is [`Clone`] + [`Send`] + [`Sync`]; clones share
/// the session and the refresh queue.
#[derive(Clone)]
pub struct AuthenticatedClient {
    monitor: ResponseMonitor,
    session: SessionState,
    config: Arc<AuthClientConfig>,
}

impl fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("base_url", &self.config.base_url)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AuthenticatedClient`].
///
/// Defaults: in-memory credential store, no logout hook, hyper transports
/// built from the config, HTTP refresh exchanger.
pub struct AuthenticatedClientBuilder {
    config: AuthClientConfig,
    store: Option<Arc<dyn CredentialStore>>,
    logout: Option<Arc<dyn LogoutHandler>>,
    transport: Option<Arc<dyn HttpTransport>>,
    exchanger: Option<Arc<dyn RefreshExchanger>>,
}

impl AuthenticatedClientBuilder {
    #[must_use]
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn logout_handler(mut self, handler: Arc<dyn LogoutHandler>) -> Self {
        self.logout = Some(handler);
        self
    }

    /// Transport for every call, the refresh exchange included unless an
    /// exchanger is set.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn exchanger(mut self, exchanger: Arc<dyn RefreshExchanger>) -> Self {
        self.exchanger = Some(exchanger);
        self
    }

    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the config is invalid or an HTTP
    /// client cannot be built from it.
    pub fn build(self) -> Result<AuthenticatedClient, AuthError> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let build_http = |http_config: HttpClientConfig| {
            HttpClientBuilder::with_config(http_config)
                .build()
                .map(|client| Arc::new(client) as Arc<dyn HttpTransport>)
                .map_err(|e| AuthError::Config(format!("HTTP client: {e}")))
        };

        let exchanger: Arc<dyn RefreshExchanger> = match (self.exchanger, &self.transport) {
            (Some(exchanger), _) => exchanger,
            (None, Some(transport)) => Arc::new(HttpRefreshExchanger::new(
                Arc::clone(transport),
                config.url_for(&config.refresh_path)?,
            )),
            (None, None) => Arc::new(HttpRefreshExchanger::new(
                build_http(config.refresh_http_config())?,
                config.url_for(&config.refresh_path)?,
            )),
        };
        let transport = match self.transport {
            Some(transport) => transport,
            None => build_http(config.http.clone())?,
        };

        let store: Arc<dyn CredentialStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryCredentialStore::new()),
        };
        let logout: Arc<dyn LogoutHandler> = match self.logout {
            Some(logout) => logout,
            None => Arc::new(NoopLogout),
        };

        let session = SessionState::new(store);
        let coordinator =
            RefreshCoordinator::new(session.clone(), exchanger, logout, config.refresh_timeout);
        let dispatcher = RequestDispatcher::new(transport, Arc::clone(&config), session.clone());

        Ok(AuthenticatedClient {
            monitor: ResponseMonitor::new(dispatcher, coordinator),
            session,
            config,
        })
    }
}

impl AuthenticatedClient {
    #[must_use]
    pub fn builder(config: AuthClientConfig) -> AuthenticatedClientBuilder {
        AuthenticatedClientBuilder {
            config,
            store: None,
            logout: None,
            transport: None,
            exchanger: None,
        }
    }

    /// Client with the default hyper transport and the given store and
    /// logout hook.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedClientBuilder::build`].
    pub fn new(
        config: AuthClientConfig,
        store: Arc<dyn CredentialStore>,
        logout: Arc<dyn LogoutHandler>,
    ) -> Result<Self, AuthError> {
        Self::builder(config)
            .credential_store(store)
            .logout_handler(logout)
            .build()
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub fn coordinator(&self) -> &RefreshCoordinator {
        self.monitor.coordinator()
    }

    #[must_use]
    pub fn config(&self) -> &AuthClientConfig {
        &self.config
    }

    /// Send a request and return its successful response.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Api`] for non-2xx responses other than a resource 401
    /// - [`AuthError::SessionExpired`] when the session could not be renewed
    /// - [`AuthError::Transport`] when no response was obtained
    pub async fn send(&self, request: RequestDescriptor) -> Result<HttpResponse, AuthError> {
        let response = self.monitor.execute(&request).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(AuthError::Api(ApiError::from_response(&response)))
        }
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get(&self, path: &str) -> Result<HttpResponse, AuthError> {
        self.send(RequestDescriptor::get(path)).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post(&self, path: &str, payload: Value) -> Result<HttpResponse, AuthError> {
        self.send(RequestDescriptor::post(path).with_payload(payload))
            .await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn put(&self, path: &str, payload: Value) -> Result<HttpResponse, AuthError> {
        self.send(RequestDescriptor::put(path).with_payload(payload))
            .await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn patch(&self, path: &str, payload: Value) -> Result<HttpResponse, AuthError> {
        self.send(RequestDescriptor::patch(path).with_payload(payload))
            .await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete(&self, path: &str) -> Result<HttpResponse, AuthError> {
        self.send(RequestDescriptor::delete(path)).await
    }

    /// GET `path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send); [`AuthError::InvalidResponse`] if the body
    /// does not decode as `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        self.get(path)
            .await?
            .json()
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }

    /// Sign in and store the issued credentials.
    ///
    /// A 401 here means bad credentials and is returned as
    /// [`AuthError::Api`]; it never triggers a refresh.
    ///
    /// # Errors
    ///
    /// [`AuthError::Api`] on rejection, [`AuthError::InvalidResponse`] if
    /// the response carries no access credential, [`AuthError::Store`] if it
    /// cannot be persisted.
    #[instrument(skip_all)]
    pub async fn login<P: Serialize + ?Sized>(&self, credentials: &P) -> Result<(), AuthError> {
        let request = RequestDescriptor::post(&self.config.login_path).with_json(credentials)?;
        let response = self.send(request).await?;
        let grant = response
            .json::<TokenPairResponse>()
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?
            .into_grant()
            .map_err(AuthError::InvalidResponse)?;
        if grant.refresh.is_none() {
            warn!("login response carried no refresh credential; session cannot be renewed");
        }
        self.session
            .write(Session::from_parts(Some(grant.access), grant.refresh))
            .await?;
        info!("signed in");
        Ok(())
    }

    /// Create an account.
    ///
    /// The response is returned as-is. If it carries credentials, they
    /// become the current session.
    ///
    /// # Errors
    ///
    /// [`AuthError::Api`] on rejection, [`AuthError::Store`] if issued
    /// credentials cannot be persisted.
    #[instrument(skip_all)]
    pub async fn register<P: Serialize + ?Sized>(
        &self,
        payload: &P,
    ) -> Result<HttpResponse, AuthError> {
        let request = RequestDescriptor::post(&self.config.register_path).with_json(payload)?;
        let response = self.send(request).await?;
        if let Some(grant) = response
            .json::<TokenPairResponse>()
            .ok()
            .and_then(|pair| pair.into_grant().ok())
        {
            self.session
                .write(Session::from_parts(Some(grant.access), grant.refresh))
                .await?;
            info!("registered and signed in");
        }
        Ok(response)
    }

    /// Sign out locally. Does not invoke the [`LogoutHandler`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the store cannot be cleared; the
    /// in-memory session is cleared regardless.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.session.clear().await?;
        info!("signed out");
        Ok(())
    }

    /// Load the persisted session, e.g. at startup.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the store cannot be read.
    pub async fn restore(&self) -> Result<SessionStatus, AuthError> {
        Ok(self.session.restore().await?)
    }
}
