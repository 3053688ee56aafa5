use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use crate::secret::SecretString;
use crate::store::{CredentialStore, StoreError};

/// The pair of credentials held for the signed-in user.
///
/// Either credential may be absent. A session without a refresh credential
/// cannot be renewed once its access credential is rejected.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
}

impl Session {
    #[must_use]
    pub fn new(access: SecretString, refresh: SecretString) -> Self {
        Self {
            access: Some(access),
            refresh: Some(refresh),
        }
    }

    #[must_use]
    pub fn from_parts(access: Option<SecretString>, refresh: Option<SecretString>) -> Self {
        Self { access, refresh }
    }

    #[must_use]
    pub fn access_credential(&self) -> Option<&SecretString> {
        self.access.as_ref()
    }

    #[must_use]
    pub fn refresh_credential(&self) -> Option<&SecretString> {
        self.refresh.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access.is_some() || self.refresh.is_some()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        if self.is_authenticated() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::LoggedOut
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("has_access", &self.access.is_some())
            .field("has_refresh", &self.refresh.is_some())
            .finish()
    }
}

/// Coarse session state published to observers (UI, CLI prompts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Authenticated,
    LoggedOut,
}

struct SessionInner {
    current: ArcSwap<Session>,
    // Serializes store writes with the in-memory swap.
    write_lock: Mutex<()>,
    store: Arc<dyn CredentialStore>,
    status: watch::Sender<SessionStatus>,
}

/// Shared, observable view of the current [`Session`] backed by a
/// [`CredentialStore`].
///
/// Reads are lock-free. Every write goes to the store first and only then
/// becomes visible in memory, so a failed persist never leaves memory ahead
/// of storage.
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("current", &*self.inner.current.load())
            .finish_non_exhaustive()
    }
}

impl SessionState {
    /// Empty (logged out) state over `store`. Call [`restore`](Self::restore)
    /// to pick up a previously saved session.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (status, _) = watch::channel(SessionStatus::LoggedOut);
        Self {
            inner: Arc::new(SessionInner {
                current: ArcSwap::from_pointee(Session::default()),
                write_lock: Mutex::new(()),
                store,
                status,
            }),
        }
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn read(&self) -> Arc<Session> {
        self.inner.current.load_full()
    }

    #[must_use]
    pub fn access_credential(&self) -> Option<SecretString> {
        self.inner.current.load().access_credential().cloned()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.inner.status.borrow()
    }

    /// Watch status transitions. Only changes are published.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    /// Replace the session, persisting it first.
    ///
    /// # Errors
    ///
    /// Returns the store error; memory is left untouched in that case.
    pub async fn write(&self, session: Session) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        self.inner.store.save(&session).await?;
        self.publish(session);
        Ok(())
    }

    /// Drop both credentials from memory and the store.
    ///
    /// Memory is cleared even when the store fails, since a session that
    /// the server rejected must not be used again.
    ///
    /// # Errors
    ///
    /// Returns the store error after memory has been cleared.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        self.publish(Session::default());
        self.inner.store.clear().await
    }

    /// Clear the session only if its access credential is still `stale`.
    ///
    /// Returns `false` when another task already replaced or cleared the
    /// session, which keeps concurrent rejections from logging out twice.
    ///
    /// # Errors
    ///
    /// Returns the store error after memory has been cleared.
    pub async fn clear_if_current(&self, stale: &SecretString) -> Result<bool, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        if self.inner.current.load().access_credential() != Some(stale) {
            debug!("session already replaced; skipping clear");
            return Ok(false);
        }
        self.publish(Session::default());
        self.inner.store.clear().await?;
        Ok(true)
    }

    /// Install `session` only if the current refresh credential is still
    /// `used`.
    ///
    /// Returns `false`, writing nothing, when the session was logged out or
    /// replaced since `used` was read.
    ///
    /// # Errors
    ///
    /// Returns the store error; memory is left untouched in that case.
    pub async fn replace_if_refresh(
        &self,
        used: &SecretString,
        session: Session,
    ) -> Result<bool, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        if self.inner.current.load().refresh_credential() != Some(used) {
            debug!("session changed during refresh; discarding refreshed credentials");
            return Ok(false);
        }
        self.inner.store.save(&session).await?;
        self.publish(session);
        Ok(true)
    }

    /// Clear a signed-in session whose refresh credential is still `used`.
    ///
    /// `None` matches a session holding only an access credential. Returns
    /// `false` when the session is already logged out or was replaced.
    ///
    /// # Errors
    ///
    /// Returns the store error after memory has been cleared.
    pub async fn clear_if_refresh(&self, used: Option<&SecretString>) -> Result<bool, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let current = self.read();
        if !current.is_authenticated() || current.refresh_credential() != used {
            debug!("session changed during refresh; leaving it in place");
            return Ok(false);
        }
        self.publish(Session::default());
        self.inner.store.clear().await?;
        Ok(true)
    }

    /// Load the session saved in the store into memory.
    ///
    /// # Errors
    ///
    /// Returns the store error; the in-memory session is unchanged.
    pub async fn restore(&self) -> Result<SessionStatus, StoreError> {
        let _guard = self.inner.write_lock.lock().await;
        let session = self.inner.store.load().await?;
        let status = session.status();
        info!(?status, "session restored from credential store");
        self.publish(session);
        Ok(status)
    }

    fn publish(&self, session: Session) {
        let status = session.status();
        self.inner.current.store(Arc::new(session));
        self.inner.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
