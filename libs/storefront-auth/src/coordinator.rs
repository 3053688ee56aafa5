//! Single-flight credential refresh.
//!
//! However many calls observe a 401 at the same time, at most one refresh
//! exchange is in flight. Every call that arrives while it runs is parked in
//! a FIFO queue and settled with the same outcome once it completes.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, info, info_span, trace, warn};

use crate::error::ExpiryCause;
use crate::exchanger::RefreshExchanger;
use crate::secret::SecretString;
use crate::session::{Session, SessionState};
use crate::traits::LogoutHandler;

type Outcome = Result<SecretString, ExpiryCause>;

/// A call waiting for the in-flight refresh to settle.
///
/// Settled exactly once: resolved with the new access credential or
/// rejected with the cause that ended the session.
pub struct PendingCall {
    tx: oneshot::Sender<Outcome>,
}

impl PendingCall {
    fn new() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn resolve(self, credential: SecretString) {
        self.settle(Ok(credential));
    }

    pub fn reject(self, cause: ExpiryCause) {
        self.settle(Err(cause));
    }

    fn settle(self, outcome: Outcome) {
        if self.tx.send(outcome).is_err() {
            trace!("waiting call was dropped before the refresh settled");
        }
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("waiting", &!self.tx.is_closed())
            .finish()
    }
}

#[derive(Default)]
struct CoordinatorState {
    refreshing: bool,
    queue: VecDeque<PendingCall>,
}

struct CoordinatorInner {
    session: SessionState,
    exchanger: Arc<dyn RefreshExchanger>,
    logout: Arc<dyn LogoutHandler>,
    refresh_timeout: Duration,
    state: Mutex<CoordinatorState>,
}

/// Serializes credential refresh across all callers of one client.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &state.refreshing)
            .field("pending", &state.queue.len())
            .field("refresh_timeout", &self.inner.refresh_timeout)
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(
        session: SessionState,
        exchanger: Arc<dyn RefreshExchanger>,
        logout: Arc<dyn LogoutHandler>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                session,
                exchanger,
                logout,
                refresh_timeout,
                state: Mutex::new(CoordinatorState::default()),
            }),
        }
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.state.lock().refreshing
    }

    /// Number of calls parked on the in-flight refresh.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Obtain a fresh access credential for a call rejected with `stale`.
    ///
    /// If the session already holds a different credential (a refresh that
    /// finished after this call was sent) it is returned immediately.
    /// Otherwise the caller joins the queue, starting a refresh if none is
    /// running, and waits for it to settle.
    ///
    /// The refresh runs on its own task, so dropping this future never
    /// strands the other waiters.
    ///
    /// # Errors
    ///
    /// Returns the [`ExpiryCause`] of a failed refresh. By then the session
    /// has been cleared, unless it was logged out or replaced while the
    /// refresh ran ([`ExpiryCause::Superseded`]).
    pub async fn acquire(&self, stale: Option<&SecretString>) -> Result<SecretString, ExpiryCause> {
        let (call, outcome) = PendingCall::new();
        let start = {
            let mut state = self.inner.state.lock();
            let start = !state.refreshing;
            if start {
                let session = self.inner.session.read();
                if let Some(current) = session.access_credential() {
                    if stale.is_none_or(|s| s != current) {
                        debug!("credential already replaced; skipping refresh");
                        return Ok(current.clone());
                    }
                }
                if !session.is_authenticated() {
                    debug!("no session to refresh");
                    return Err(ExpiryCause::MissingRefreshCredential);
                }
                state.refreshing = true;
            }
            state.queue.push_back(call);
            start
        };

        if start {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(
                async move { inner.run_cycle().await }.instrument(info_span!("credential_refresh")),
            );
        } else {
            debug!("refresh in flight; queued behind it");
        }

        outcome.await.unwrap_or(Err(ExpiryCause::Aborted))
    }

    /// End the session after a replayed call was rejected with `sent`.
    ///
    /// Only the first rejection of a given credential clears the session and
    /// notifies the logout handler. Returns whether this call did so.
    pub async fn expire(&self, sent: &SecretString) -> bool {
        match self.inner.session.clear_if_current(sent).await {
            Ok(false) => false,
            Ok(true) => {
                warn!("refreshed credential rejected; ending session");
                self.inner.logout.on_logout().await;
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to clear credential store; session cleared in memory");
                self.inner.logout.on_logout().await;
                true
            }
        }
    }
}

/// Settles the queue with `Aborted` if the refresh task is torn down
/// before it finished.
struct SettleOnDrop<'a> {
    inner: &'a CoordinatorInner,
    armed: bool,
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            let drained = self.inner.settle(&Err(ExpiryCause::Aborted));
            warn!(drained, "refresh task ended without settling");
        }
    }
}

impl CoordinatorInner {
    async fn run_cycle(&self) {
        let mut guard = SettleOnDrop {
            inner: self,
            armed: true,
        };

        let used = self.session.read().refresh_credential().cloned();
        let mut outcome = self.refresh(used.as_ref()).await;
        let forced_logout = match &outcome {
            Ok(_) => {
                info!("credential refresh succeeded");
                false
            }
            Err(ExpiryCause::Superseded) => {
                info!("session changed during refresh; result discarded");
                false
            }
            Err(cause) => {
                warn!(%cause, "credential refresh failed; ending session");
                match self.session.clear_if_refresh(used.as_ref()).await {
                    Ok(cleared) => cleared,
                    Err(e) => {
                        warn!(error = %e, "failed to clear credential store");
                        true
                    }
                }
            }
        };
        if outcome.is_err() && !forced_logout {
            outcome = Err(ExpiryCause::Superseded);
        }

        guard.armed = false;
        let drained = self.settle(&outcome);
        debug!(drained, "refresh waiters settled");

        if forced_logout {
            self.logout.on_logout().await;
        }
    }

    /// Exchange `used` and install the result, unless the session moved on
    /// while the exchange was in flight.
    async fn refresh(&self, used: Option<&SecretString>) -> Outcome {
        let Some(used) = used else {
            return Err(ExpiryCause::MissingRefreshCredential);
        };

        let grant = tokio::time::timeout(self.refresh_timeout, self.exchanger.exchange(used))
            .await
            .map_err(|_| ExpiryCause::TimedOut(self.refresh_timeout))??;

        let access = grant.access;
        let refresh = grant.refresh.unwrap_or_else(|| used.clone());
        let installed = self
            .session
            .replace_if_refresh(used, Session::new(access.clone(), refresh))
            .await
            .map_err(|e| ExpiryCause::Persist(e.to_string()))?;
        if installed {
            Ok(access)
        } else {
            Err(ExpiryCause::Superseded)
        }
    }

    /// Drain the queue in arrival order, then allow the next refresh.
    fn settle(&self, outcome: &Outcome) -> usize {
        let mut state = self.state.lock();
        let drained = state.queue.len();
        while let Some(call) = state.queue.pop_front() {
            match outcome {
                Ok(credential) => call.resolve(credential.clone()),
                Err(cause) => call.reject(cause.clone()),
            }
        }
        state.refreshing = false;
        drained
    }
}
