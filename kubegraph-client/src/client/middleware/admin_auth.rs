//! Admin credential injection for requests that reach the upstream.

use http::{header::AUTHORIZATION, HeaderValue, Request};
use tower::{Layer, Service};

/// Layer that adds the cluster's admin `Authorization` header to requests
/// that do not already carry one.
///
/// End-user bearer headers set by [`UserAuth`](super::UserAuth) above this
/// layer are left untouched; only discovery and impersonated requests reach
/// the upstream with admin credentials.
#[derive(Clone)]
pub struct AdminAuthLayer {
    header: Option<HeaderValue>,
}

impl AdminAuthLayer {
    /// Create a layer from pre-rendered credentials; `None` disables it.
    pub fn new(header: Option<HeaderValue>) -> Self {
        Self { header }
    }
}

impl<S> Layer<S> for AdminAuthLayer {
    type Service = AdminAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdminAuth {
            inner,
            header: self.header.clone(),
        }
    }
}

/// Service that adds admin credentials when no `Authorization` is present.
#[derive(Clone)]
pub struct AdminAuth<S> {
    inner: S,
    header: Option<HeaderValue>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AdminAuth<S>
where
    S: Service<Request<ReqBody>>,
{
    type Error = S::Error;
    type Future = S::Future;
    type Response = S::Response;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        if let Some(header) = &self.header {
            if !req.headers().contains_key(AUTHORIZATION) {
                req.headers_mut().insert(AUTHORIZATION, header.clone());
            }
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::pin_mut;
    use http::Response;
    use tokio_test::assert_ready_ok;
    use tower_test::{mock, mock::Handle};

    use crate::client::Body;

    #[tokio::test(flavor = "current_thread")]
    async fn adds_admin_header_when_absent() {
        let layer = AdminAuthLayer::new(Some(HeaderValue::from_static("Bearer admin")));
        let (mut service, handle): (_, Handle<Request<Body>, Response<Body>>) =
            mock::spawn_layer(layer);

        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.headers().get(AUTHORIZATION).unwrap(), "Bearer admin");
            send.send_response(Response::builder().body(Body::empty()).unwrap());
        });

        assert_ready_ok!(service.poll_ready());
        service
            .call(Request::builder().uri("/api").body(Body::empty()).unwrap())
            .await
            .unwrap();
        spawned.await.unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn keeps_existing_header() {
        let layer = AdminAuthLayer::new(Some(HeaderValue::from_static("Bearer admin")));
        let (mut service, handle): (_, Handle<Request<Body>, Response<Body>>) =
            mock::spawn_layer(layer);

        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.headers().get(AUTHORIZATION).unwrap(), "Bearer user");
            send.send_response(Response::builder().body(Body::empty()).unwrap());
        });

        assert_ready_ok!(service.poll_ready());
        service
            .call(
                Request::builder()
                    .uri("/api/v1/pods")
                    .header(AUTHORIZATION, "Bearer user")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        spawned.await.unwrap();
    }
}
