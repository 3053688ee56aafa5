use crate::error::HttpError;
use http::{HeaderValue, Request};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Stamps a default `User-Agent` on outgoing requests that do not carry one.
#[derive(Clone, Debug)]
pub struct UserAgentLayer {
    user_agent: HeaderValue,
}

impl UserAgentLayer {
    /// # Errors
    /// [`HttpError::InvalidHeaderValue`] when `user_agent` contains bytes illegal in a header.
    pub fn try_new(user_agent: impl AsRef<str>) -> Result<Self, HttpError> {
        let user_agent =
            HeaderValue::from_str(user_agent.as_ref()).map_err(HttpError::InvalidHeaderValue)?;
        Ok(Self { user_agent })
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgentService {
            inner,
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Service produced by [`UserAgentLayer`].
#[derive(Clone, Debug)]
pub struct UserAgentService<S> {
    inner: S,
    user_agent: HeaderValue,
}

impl<S, ReqBody> Service<Request<ReqBody>> for UserAgentService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        req.headers_mut()
            .entry(http::header::USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use tower::ServiceExt;

    /// Echoes the User-Agent header back as the response.
    #[derive(Clone)]
    struct EchoUa;

    impl Service<Request<()>> for EchoUa {
        type Response = Option<HeaderValue>;
        type Error = std::convert::Infallible;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<()>) -> Self::Future {
            std::future::ready(Ok(req.headers().get(http::header::USER_AGENT).cloned()))
        }
    }

    #[tokio::test]
    async fn adds_user_agent_when_missing() {
        let svc = UserAgentLayer::try_new("storefront/1.0").unwrap().layer(EchoUa);
        let ua = svc.oneshot(Request::new(())).await.unwrap();
        assert_eq!(ua, Some(HeaderValue::from_static("storefront/1.0")));
    }

    #[tokio::test]
    async fn keeps_caller_user_agent() {
        let svc = UserAgentLayer::try_new("storefront/1.0").unwrap().layer(EchoUa);
        let req = Request::builder()
            .header(http::header::USER_AGENT, "custom/2.0")
            .body(())
            .unwrap();
        let ua = svc.oneshot(req).await.unwrap();
        assert_eq!(ua, Some(HeaderValue::from_static("custom/2.0")));
    }

    #[test]
    fn rejects_invalid_user_agent() {
        assert!(matches!(
            UserAgentLayer::try_new("bad\nagent"),
            Err(HttpError::InvalidHeaderValue(_))
        ));
    }
}
