#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Authenticated request layer for the storefront back office.
//!
//! Every outbound call carries the current bearer credential. When a call
//! comes back `401 Unauthorized`, the layer exchanges the refresh credential
//! for a new access credential exactly once no matter how many calls failed
//! concurrently, then replays each failed call once with the new credential.
//! A failed exchange ends the session for everyone and triggers a single
//! forced logout.
//!
//! ```ignore
//! use std::sync::Arc;
//! use storefront_auth::{AuthClientConfig, AuthenticatedClient, FileCredentialStore, NoopLogout};
//!
//! let client = AuthenticatedClient::builder(config)
//!     .credential_store(Arc::new(FileCredentialStore::new("/var/lib/storefront/session.json")))
//!     .logout_handler(Arc::new(NoopLogout))
//!     .build()?;
//! client.restore().await?;
//! let orders: Vec<Order> = client.get_json("/orders").await?;
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod endpoints;
pub mod error;
pub mod exchanger;
pub mod monitor;
pub mod request;
pub mod secret;
pub mod session;
pub mod store;
pub mod traits;

pub use client::{AuthenticatedClient, AuthenticatedClientBuilder};
pub use config::AuthClientConfig;
pub use coordinator::{PendingCall, RefreshCoordinator};
pub use dispatcher::{Dispatched, RequestDispatcher};
pub use endpoints::{AuthEndpoints, EndpointKind};
pub use error::{ApiError, AuthError, ErrorClass, ExpiryCause};
pub use exchanger::{HttpRefreshExchanger, RefreshExchanger, RefreshGrant};
pub use monitor::ResponseMonitor;
pub use request::{Method, RequestDescriptor};
pub use secret::SecretString;
pub use session::{Session, SessionState, SessionStatus};
pub use store::{
    ACCESS_TOKEN_KEY, CredentialStore, FileCredentialStore, MemoryCredentialStore,
    REFRESH_TOKEN_KEY, StoreError,
};
pub use traits::{LogoutHandler, NoopLogout};

pub use storefront_http::{HttpClientConfig, HttpError, HttpResponse, HttpTransport};
