use http::StatusCode;
use storefront_http::HttpResponse;
use tracing::{debug, instrument, warn};

use crate::coordinator::RefreshCoordinator;
use crate::dispatcher::RequestDispatcher;
use crate::error::{AuthError, ExpiryCause};
use crate::request::RequestDescriptor;

/// Watches responses for `401 Unauthorized` and drives refresh and replay.
///
/// A call is replayed at most once. Responses other than a resource 401
/// are handed back untouched, including 401s from the auth endpoints.
#[derive(Debug, Clone)]
pub struct ResponseMonitor {
    dispatcher: RequestDispatcher,
    coordinator: RefreshCoordinator,
}

impl ResponseMonitor {
    #[must_use]
    pub fn new(dispatcher: RequestDispatcher, coordinator: RefreshCoordinator) -> Self {
        Self {
            dispatcher,
            coordinator,
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Send `request`, refreshing and replaying once on a resource 401.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionExpired`] when the refresh fails or the replay
    ///   is rejected again. The caller never sees the underlying 401.
    /// - [`AuthError::Transport`] when either attempt gets no response.
    #[instrument(skip_all, fields(method = %request.method(), path = %request.path()))]
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<HttpResponse, AuthError> {
        let first = self.dispatcher.dispatch(request).await?;
        if first.response.status() != StatusCode::UNAUTHORIZED
            || self.dispatcher.endpoints().is_auth(request.path())
        {
            return Ok(first.response);
        }

        debug!("unauthorized; waiting for a refreshed credential");
        let credential = self.coordinator.acquire(first.credential.as_ref()).await?;

        let replay = self.dispatcher.dispatch_with(request, Some(credential)).await?;
        if replay.response.status() == StatusCode::UNAUTHORIZED {
            warn!("replay rejected with refreshed credential");
            if let Some(sent) = replay.credential.as_ref() {
                self.coordinator.expire(sent).await;
            }
            return Err(ExpiryCause::ReplayRejected.into());
        }
        Ok(replay.response)
    }
}
