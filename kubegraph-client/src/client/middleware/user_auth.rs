//! End-user authentication enforcement for outbound requests.
//!
//! Every resource request must carry an end-user bearer token in its
//! [`RequestContext`]; requests without one are answered with a synthesized
//! `401` and never reach the upstream. Discovery requests bypass the check
//! and travel with admin credentials. Inbound `Authorization` headers are
//! always replaced, never augmented, so credentials placed by other layers
//! cannot leak through.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use http::{
    header::{AUTHORIZATION, WWW_AUTHENTICATE},
    HeaderName, HeaderValue, Method, Request, Response, StatusCode,
};
use pin_project::pin_project;
use secrecy::ExposeSecret;
use tower::{Layer, Service};

use crate::{
    client::{jwt, Body},
    RequestContext,
};

const IMPERSONATE_USER: HeaderName = HeaderName::from_static("impersonate-user");
const IMPERSONATE_GROUP: HeaderName = HeaderName::from_static("impersonate-group");

/// Behavior knobs for the user-auth middleware.
#[derive(Clone, Debug)]
pub struct UserAuthParams {
    /// Skip all enforcement and forward with admin credentials.
    pub local_development: bool,
    /// Impersonate the token's subject instead of forwarding the token.
    pub impersonate: bool,
    /// JWT claim naming the user to impersonate.
    pub username_claim: String,
}

impl Default for UserAuthParams {
    fn default() -> Self {
        Self {
            local_development: false,
            impersonate: false,
            username_claim: "email".into(),
        }
    }
}

/// Layer applying [`UserAuth`].
#[derive(Clone, Debug)]
pub struct UserAuthLayer {
    params: Arc<UserAuthParams>,
}

impl UserAuthLayer {
    /// Create the layer.
    pub fn new(params: UserAuthParams) -> Self {
        Self {
            params: Arc::new(params),
        }
    }
}

impl<S> Layer<S> for UserAuthLayer {
    type Service = UserAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAuth {
            inner,
            params: self.params.clone(),
        }
    }
}

/// Middleware enforcing end-user authentication.
#[derive(Clone, Debug)]
pub struct UserAuth<S> {
    inner: S,
    params: Arc<UserAuthParams>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for UserAuth<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>>,
{
    type Error = S::Error;
    type Future = UserAuthFuture<S::Future>;
    type Response = Response<Body>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        if self.params.local_development {
            return UserAuthFuture::Forward(self.inner.call(req));
        }
        if is_discovery(req.method(), req.uri().path()) {
            return UserAuthFuture::Forward(self.inner.call(req));
        }

        let token = req
            .extensions()
            .get::<RequestContext>()
            .and_then(|ctx| ctx.bearer_token.clone())
            .filter(|t| !t.expose_secret().is_empty());
        let Some(token) = token else {
            tracing::debug!(path = req.uri().path(), "rejecting resource request without bearer token");
            return UserAuthFuture::denied();
        };

        // Replace, never augment: strip whatever credentials are set so far.
        let headers = req.headers_mut();
        while headers.remove(AUTHORIZATION).is_some() {}

        if self.params.impersonate {
            let identity = match jwt::identity_from_token(token.expose_secret(), &self.params.username_claim)
            {
                Ok(identity) => identity,
                Err(err) => {
                    tracing::debug!(%err, "rejecting request with unusable token");
                    return UserAuthFuture::denied();
                }
            };
            let Ok(user) = HeaderValue::from_str(&identity.user) else {
                return UserAuthFuture::denied();
            };
            // Admin credentials are added below this layer; the upstream
            // then acts as the impersonated user.
            headers.insert(IMPERSONATE_USER, user);
            if !identity.groups.is_empty() {
                headers.insert(IMPERSONATE_GROUP, HeaderValue::from_static("*"));
            }
        } else {
            let Ok(mut bearer) = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            else {
                return UserAuthFuture::denied();
            };
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
        }

        UserAuthFuture::Forward(self.inner.call(req))
    }
}

/// Future returned by [`UserAuth`]: forwards to the inner service or
/// resolves to a synthesized `401` without touching it.
#[pin_project(project = UserAuthFutureProj)]
pub enum UserAuthFuture<F> {
    /// Forwarding to the inner service.
    Forward(#[pin] F),
    /// Authentication failed; resolves immediately.
    Denied(Option<Response<Body>>),
}

impl<F> UserAuthFuture<F> {
    fn denied() -> Self {
        let mut resp = Response::new(Body::from("Unauthorized"));
        *resp.status_mut() = StatusCode::UNAUTHORIZED;
        resp.headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        UserAuthFuture::Denied(Some(resp))
    }
}

impl<F, E> Future for UserAuthFuture<F>
where
    F: Future<Output = Result<Response<Body>, E>>,
{
    type Output = Result<Response<Body>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            UserAuthFutureProj::Forward(f) => f.poll(cx),
            UserAuthFutureProj::Denied(resp) => {
                Poll::Ready(Ok(resp.take().expect("polled after completion")))
            }
        }
    }
}

/// Whether a request is an API discovery call.
///
/// Discovery calls are GETs against the group/version listing endpoints,
/// possibly behind a virtual-workspace routing prefix.
pub(crate) fn is_discovery(method: &Method, path: &str) -> bool {
    if method != Method::GET {
        return false;
    }
    let path = strip_routing_prefix(path);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["api"] | ["apis"] => true,
        ["api", "v1"] => true,
        ["apis", _group] => true,
        ["apis", _group, _version] => true,
        _ => false,
    }
}

// Strip `/services/<name>/clusters/<ws>`, `/services/<name>` or
// `/clusters/<ws>` from the front of the path.
fn strip_routing_prefix(path: &str) -> &str {
    fn skip_segment(p: &str) -> Option<&str> {
        let p = p.strip_prefix('/')?;
        match p.find('/') {
            Some(idx) => Some(&p[idx..]),
            None => Some(""),
        }
    }

    let mut p = path;
    if let Some(rest) = p.strip_prefix("/services") {
        p = skip_segment(rest).unwrap_or("");
    }
    if let Some(rest) = p.strip_prefix("/clusters") {
        p = skip_segment(rest).unwrap_or("");
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::pin_mut;
    use tokio_test::assert_ready_ok;
    use tower_test::{mock, mock::Handle};

    fn layer(params: UserAuthParams) -> UserAuthLayer {
        UserAuthLayer::new(params)
    }

    fn request(path: &str, ctx: Option<RequestContext>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        if let Some(ctx) = ctx {
            builder = builder.extension(ctx);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn discovery_detection() {
        let get = Method::GET;
        assert!(is_discovery(&get, "/api"));
        assert!(is_discovery(&get, "/apis"));
        assert!(is_discovery(&get, "/api/v1"));
        assert!(is_discovery(&get, "/apis/apps"));
        assert!(is_discovery(&get, "/apis/apps/v1"));
        assert!(is_discovery(&get, "/services/tenant-x/apis/apps/v1"));
        assert!(is_discovery(&get, "/services/tenant-x/clusters/root:orgs/api"));
        assert!(is_discovery(&get, "/clusters/root:orgs/apis"));

        assert!(!is_discovery(&get, "/api/v1/configmaps"));
        assert!(!is_discovery(&get, "/apis/apps/v1/deployments"));
        assert!(!is_discovery(&Method::POST, "/api"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_token_is_denied_without_upstream_call() {
        let (mut service, _handle) = mock::spawn_layer::<Request<Body>, Response<Body>, _>(layer(
            UserAuthParams::default(),
        ));
        assert_ready_ok!(service.poll_ready());
        let resp = service
            .call(request("/api/v1/namespaces/default/configmaps", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn scrubs_and_replaces_authorization() {
        let (mut service, handle): (_, Handle<Request<Body>, Response<Body>>) =
            mock::spawn_layer(layer(UserAuthParams::default()));

        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            let auths: Vec<_> = request.headers().get_all(AUTHORIZATION).iter().collect();
            assert_eq!(auths.len(), 1);
            assert_eq!(auths[0], &HeaderValue::from_static("Bearer user-xyz"));
            send.send_response(Response::builder().body(Body::empty()).unwrap());
        });

        assert_ready_ok!(service.poll_ready());
        let mut req = request(
            "/api/v1/namespaces/default/configmaps",
            Some(RequestContext::with_token("user-xyz")),
        );
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer admin-abc"));
        service.call(req).await.unwrap();
        spawned.await.unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn discovery_passes_without_token() {
        let (mut service, handle): (_, Handle<Request<Body>, Response<Body>>) =
            mock::spawn_layer(layer(UserAuthParams::default()));

        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert!(request.headers().get(AUTHORIZATION).is_none());
            send.send_response(Response::builder().body(Body::empty()).unwrap());
        });

        assert_ready_ok!(service.poll_ready());
        let req = Request::builder()
            .method(Method::GET)
            .uri("/apis/apps/v1")
            .body(Body::empty())
            .unwrap();
        service.call(req).await.unwrap();
        spawned.await.unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn impersonation_sets_headers_and_drops_user_token() {
        let (mut service, handle): (_, Handle<Request<Body>, Response<Body>>) =
            mock::spawn_layer(layer(UserAuthParams {
                impersonate: true,
                ..Default::default()
            }));

        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert!(request.headers().get(AUTHORIZATION).is_none());
            assert_eq!(
                request.headers().get("impersonate-user").unwrap(),
                "jane@example.com"
            );
            send.send_response(Response::builder().body(Body::empty()).unwrap());
        });

        assert_ready_ok!(service.poll_ready());
        let token = jwt::tests::token_with_claims(&serde_json::json!({
            "email": "jane@example.com"
        }));
        let req = request(
            "/api/v1/namespaces/default/configmaps",
            Some(RequestContext::with_token(token)),
        );
        service.call(req).await.unwrap();
        spawned.await.unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn impersonation_with_bad_token_is_denied() {
        let (mut service, _handle) = mock::spawn_layer::<Request<Body>, Response<Body>, _>(layer(
            UserAuthParams {
                impersonate: true,
                ..Default::default()
            },
        ));
        assert_ready_ok!(service.poll_ready());
        let resp = service
            .call(request(
                "/api/v1/namespaces/default/configmaps",
                Some(RequestContext::with_token("not-a-jwt")),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
