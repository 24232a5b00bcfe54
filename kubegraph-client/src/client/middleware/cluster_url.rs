//! Final URL assembly for outbound requests.
//!
//! Requests enter the stack with relative API paths. This innermost layer
//! produces the absolute upstream URL in one pass: when the request context
//! names a logical workspace and the path addresses a virtual workspace
//! (`/services/<name>/...`), a `/clusters/<workspace>/` segment is injected
//! after the service name; the result is then anchored onto the cluster's
//! base URL, keeping any path prefix the base carries (API servers behind
//! ingress paths).
//!
//! Discovery detection upstream of this layer accepts service paths both
//! with and without the cluster segment, so injecting here does not change
//! authentication decisions.

use http::{uri::PathAndQuery, Request, Uri};
use tower::{Layer, Service};

use crate::RequestContext;

/// Layer applying [`ClusterUrl`].
#[derive(Clone, Debug)]
pub struct ClusterUrlLayer {
    base: Uri,
}

impl ClusterUrlLayer {
    /// Anchor requests onto the given cluster base URL.
    pub fn new(base: Uri) -> Self {
        Self { base }
    }
}

impl<S> Layer<S> for ClusterUrlLayer {
    type Service = ClusterUrl<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClusterUrl {
            base: self.base.clone(),
            inner,
        }
    }
}

/// Middleware resolving relative API paths to absolute upstream URLs,
/// injecting virtual-workspace cluster segments along the way.
#[derive(Clone, Debug)]
pub struct ClusterUrl<S> {
    base: Uri,
    inner: S,
}

impl<S, ReqBody> Service<Request<ReqBody>> for ClusterUrl<S>
where
    S: Service<Request<ReqBody>>,
{
    type Error = S::Error;
    type Future = S::Future;
    type Response = S::Response;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let workspace = req
            .extensions()
            .get::<RequestContext>()
            .and_then(|ctx| ctx.workspace.clone());
        let (mut parts, body) = req.into_parts();
        match finalize_url(&self.base, &parts.uri, workspace.as_deref()) {
            Ok(uri) => parts.uri = uri,
            Err(err) => {
                tracing::warn!(%err, "failed to assemble upstream url, sending request as-is");
            }
        }
        self.inner.call(Request::from_parts(parts, body))
    }
}

// Workspace injection plus base anchoring in one pass.
fn finalize_url(base: &Uri, req: &Uri, workspace: Option<&str>) -> Result<Uri, http::Error> {
    let path = match workspace.and_then(|ws| inject_workspace(req.path(), ws)) {
        Some(rewritten) => rewritten,
        None => req.path().to_string(),
    };

    // `PathAndQuery` always starts with a slash, so a trimmed base prefix
    // concatenates cleanly.
    let prefix = base.path().trim_end_matches('/');
    let mut pandq = String::with_capacity(prefix.len() + path.len());
    pandq.push_str(prefix);
    pandq.push_str(&path);
    if let Some(query) = req.query() {
        pandq.push('?');
        pandq.push_str(query);
    }

    let mut parts = http::uri::Parts::default();
    parts.scheme = base.scheme().cloned();
    parts.authority = base.authority().cloned();
    parts.path_and_query = Some(pandq.parse::<PathAndQuery>()?);
    Ok(Uri::from_parts(parts)?)
}

// `/services/<name>/<rest>` -> `/services/<name>/clusters/<ws>/<rest>`,
// unless a `/clusters/` segment is already present.
fn inject_workspace(path: &str, workspace: &str) -> Option<String> {
    if path.contains("/clusters/") {
        return None;
    }
    let rest = path.strip_prefix("/services/")?;
    let (name, tail) = rest.split_once('/')?;
    Some(format!("/services/{name}/clusters/{workspace}/{tail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::pin_mut;
    use http::Response;
    use tokio_test::assert_ready_ok;
    use tower_test::{mock, mock::Handle};

    use crate::client::Body;

    fn finalized(base: &str, req: &str, workspace: Option<&str>) -> String {
        finalize_url(
            &Uri::from_maybe_shared(base.to_string()).unwrap(),
            &Uri::from_maybe_shared(req.to_string()).unwrap(),
            workspace,
        )
        .unwrap()
        .to_string()
    }

    #[test]
    fn absolutizes_relative_api_paths() {
        assert_eq!(
            finalized("https://k.example:6443", "/api/v1/configmaps?limit=1", None),
            "https://k.example:6443/api/v1/configmaps?limit=1"
        );
    }

    #[test]
    fn keeps_base_path_prefixes() {
        // API servers exposed behind an ingress path keep their prefix
        assert_eq!(
            finalized("https://gateway.example/tenants/blue/", "/apis/apps/v1", None),
            "https://gateway.example/tenants/blue/apis/apps/v1"
        );
    }

    #[test]
    fn injects_workspace_into_service_paths() {
        assert_eq!(
            finalized(
                "https://kcp.example:6443",
                "/services/tenant-x/api/v1/configmaps?watch=true",
                Some("root:orgs"),
            ),
            "https://kcp.example:6443/services/tenant-x/clusters/root:orgs/api/v1/configmaps?watch=true"
        );
    }

    #[test]
    fn skips_injection_when_cluster_segment_present() {
        assert_eq!(
            finalized(
                "https://kcp.example:6443",
                "/services/tenant-x/clusters/root:orgs/api/v1/configmaps",
                Some("root:orgs"),
            ),
            "https://kcp.example:6443/services/tenant-x/clusters/root:orgs/api/v1/configmaps"
        );
    }

    #[test]
    fn ignores_workspace_for_plain_paths() {
        assert_eq!(
            finalized("https://k.example:6443", "/api/v1/configmaps", Some("root:orgs")),
            "https://k.example:6443/api/v1/configmaps"
        );
        assert_eq!(inject_workspace("/services/tenant-x", "root:orgs"), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resolves_requests_with_workspace_context() {
        let layer = ClusterUrlLayer::new(Uri::from_static("https://kcp.example:6443"));
        let (mut service, handle): (_, Handle<Request<Body>, Response<Body>>) =
            mock::spawn_layer(layer);

        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(
                request.uri(),
                "https://kcp.example:6443/services/tenant-x/clusters/root:orgs/api/v1/configmaps?watch=true"
            );
            send.send_response(Response::builder().body(Body::empty()).unwrap());
        });

        assert_ready_ok!(service.poll_ready());
        let mut ctx = RequestContext::default();
        ctx.workspace = Some("root:orgs".into());
        let req = Request::builder()
            .uri("/services/tenant-x/api/v1/configmaps?watch=true")
            .extension(ctx)
            .body(Body::empty())
            .unwrap();
        service.call(req).await.unwrap();
        spawned.await.unwrap();
    }
}
