use async_trait::async_trait;

/// Hook invoked once when the session ends involuntarily.
///
/// Called after the session is cleared and every queued call has been
/// rejected: on a failed refresh, and when a replayed call is rejected
/// again. Not called for an explicit [`AuthenticatedClient::logout`].
///
/// [`AuthenticatedClient::logout`]: crate::AuthenticatedClient::logout
#[async_trait]
pub trait LogoutHandler: Send + Sync {
    async fn on_logout(&self);
}

/// Does nothing. Observers can still follow
/// [`SessionState::subscribe`](crate::SessionState::subscribe).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogout;

#[async_trait]
impl LogoutHandler for NoopLogout {
    async fn on_logout(&self) {}
}
