//! HTTP surface: routing, GraphQL execution, SSE subscriptions, CORS.

use std::{convert::Infallible, sync::Arc};

use async_graphql::http::{playground_source, GraphQLPlaygroundConfig, GraphiQLSource};
use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{sse, Html, IntoResponse, Response},
    routing::get,
    Router,
};
use futures::StreamExt;
use kubegraph_client::RequestContext;
use secrecy::SecretString;
use tower_http::{cors, cors::CorsLayer, trace::TraceLayer};

use crate::{
    cluster::TargetCluster,
    registry::ClusterRegistry,
    settings::{CorsSettings, Settings},
};

const CLUSTER_NAME_HEADER: &str = "x-cluster-name";
const MAX_REQUEST_BYTES: usize = 2 * 1024 * 1024;

struct AppState {
    registry: Arc<ClusterRegistry>,
    settings: Arc<Settings>,
}

/// Build the gateway router.
pub fn router(registry: Arc<ClusterRegistry>, settings: Arc<Settings>) -> Router {
    let state = Arc::new(AppState {
        registry,
        settings: settings.clone(),
    });
    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .fallback(dispatch)
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if settings.gateway.cors.enabled {
        router = router.layer(cors_layer(&settings.gateway.cors));
    }
    router
}

async fn healthz() -> &'static str {
    "ok"
}

/// A matched gateway path.
#[derive(Debug, PartialEq)]
pub(crate) struct RouteMatch {
    pub cluster: String,
    pub workspace: Option<String>,
}

/// Match `/{cluster}/{suffix}` or
/// `/{virtualPrefix}/{name}/{workspace}/{suffix}`.
///
/// Cluster names may contain `/` (artifacts in subdirectories), so the
/// regular pattern greedily consumes everything before the suffix.
pub(crate) fn match_route(path: &str, settings: &Settings) -> Option<RouteMatch> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (last, rest) = segments.split_last()?;
    if *last != settings.url.graphql_suffix || rest.is_empty() {
        return None;
    }
    if rest.len() == 3 && rest[0] == settings.url.virtual_workspace_prefix {
        return Some(RouteMatch {
            cluster: format!("{}/{}", rest[0], rest[1]),
            workspace: Some(rest[2].to_string()),
        });
    }
    Some(RouteMatch {
        cluster: rest.join("/"),
        workspace: None,
    })
}

fn bearer_token(headers: &header::HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

fn is_introspection(query: &str) -> bool {
    query.contains("__schema") || query.contains("__type")
}

async fn dispatch(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let (parts, body) = req.into_parts();

    let Some(route) = match_route(parts.uri.path(), &state.settings) else {
        return status_response(StatusCode::NOT_FOUND, "no such endpoint");
    };
    let cluster_name = parts
        .headers
        .get(CLUSTER_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| route.cluster.clone());
    let Some(cluster) = state.registry.get(&cluster_name) else {
        return status_response(StatusCode::NOT_FOUND, "unknown cluster");
    };

    let bearer = bearer_token(&parts.headers);
    let workspace = route.workspace.clone().or_else(|| {
        state
            .settings
            .enable_kcp
            .then(|| state.settings.url.default_kcp_workspace.clone())
    });
    let ctx = RequestContext {
        bearer_token: bearer.clone().map(SecretString::from),
        workspace,
    };

    if parts.method == Method::GET {
        debug_page(&state.settings, parts.uri.path())
    } else if parts.method == Method::POST {
        if bearer.is_none() && !state.settings.local_development {
            return status_response(StatusCode::UNAUTHORIZED, "unauthorized");
        }
        let bytes = match axum::body::to_bytes(body, MAX_REQUEST_BYTES).await {
            Ok(bytes) => bytes,
            Err(_) => return status_response(StatusCode::BAD_REQUEST, "unreadable body"),
        };
        let gql_request: async_graphql::Request = match serde_json::from_slice(&bytes) {
            Ok(request) => request,
            Err(err) => {
                return status_response(StatusCode::BAD_REQUEST, &format!("invalid request: {err}"))
            }
        };

        if state.settings.gateway.introspection_authentication
            && is_introspection(&gql_request.query)
            && !state.settings.local_development
        {
            if let Some(response) = introspection_auth_failure(&cluster, &ctx).await {
                return response;
            }
        }

        let wants_sse = parts
            .headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/event-stream"));
        if wants_sse {
            subscription_response(cluster, gql_request, ctx)
        } else {
            let response = cluster.execute(gql_request, ctx).await;
            json_response(&response, state.settings.gateway.handler_cfg.pretty)
        }
    } else {
        status_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    }
}

/// Validate the token against the target cluster before serving schema
/// introspection. `200` and `403` both prove authentication.
async fn introspection_auth_failure(
    cluster: &TargetCluster,
    ctx: &RequestContext,
) -> Option<Response> {
    match cluster.check_token(ctx).await {
        Ok(status) if status == StatusCode::OK || status == StatusCode::FORBIDDEN => None,
        Ok(status) if status == StatusCode::UNAUTHORIZED => {
            Some(status_response(StatusCode::UNAUTHORIZED, "Invalid token"))
        }
        Ok(status) => Some(status_response(
            StatusCode::UNAUTHORIZED,
            &format!("token validation failed with status {status}"),
        )),
        Err(err) => {
            tracing::warn!(%err, "token validation request failed");
            Some(status_response(
                StatusCode::UNAUTHORIZED,
                "token validation failed",
            ))
        }
    }
}

fn debug_page(settings: &Settings, endpoint: &str) -> Response {
    let handler = &settings.gateway.handler_cfg;
    if handler.graphiql {
        Html(GraphiQLSource::build().endpoint(endpoint).finish()).into_response()
    } else if handler.playground {
        Html(playground_source(GraphQLPlaygroundConfig::new(endpoint))).into_response()
    } else {
        status_response(StatusCode::NOT_FOUND, "no such endpoint")
    }
}

fn json_response(response: &async_graphql::Response, pretty: bool) -> Response {
    let rendered = if pretty {
        serde_json::to_string_pretty(response)
    } else {
        serde_json::to_string(response)
    };
    match rendered {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(err) => status_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("failed to serialize response: {err}"),
        ),
    }
}

/// Serve a subscription as Server-Sent Events: one `next` frame per
/// result, a final `complete` frame, teardown on client disconnect or
/// cluster removal.
fn subscription_response(
    cluster: Arc<TargetCluster>,
    request: async_graphql::Request,
    ctx: RequestContext,
) -> Response {
    let cancel = cluster.cancel_token();
    let responses = cluster.execute_stream(request, ctx);

    let events = async_stream::stream! {
        futures::pin_mut!(responses);
        let cancelled = cancel.cancelled();
        futures::pin_mut!(cancelled);
        loop {
            tokio::select! {
                _ = &mut cancelled => break,
                next = responses.next() => match next {
                    Some(response) => {
                        match serde_json::to_string(&response) {
                            Ok(data) => yield Ok::<_, Infallible>(sse::Event::default().event("next").data(data)),
                            Err(err) => {
                                tracing::error!(%err, "failed to serialize subscription frame");
                                break;
                            }
                        }
                    }
                    None => break,
                },
            }
        }
        yield Ok(sse::Event::default().event("complete"));
    };
    sse::Sse::new(events).into_response()
}

fn status_response(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}

fn cors_layer(cfg: &CorsSettings) -> CorsLayer {
    let mut layer = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::OPTIONS]);
    layer = if cfg.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(cors::Any)
    } else {
        layer.allow_origin(
            cfg.allowed_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        )
    };
    layer = if cfg.allowed_headers.iter().any(|h| h == "*") {
        layer.allow_headers(cors::Any)
    } else {
        layer.allow_headers(
            cfg.allowed_headers
                .iter()
                .filter_map(|h| h.parse::<HeaderName>().ok())
                .collect::<Vec<_>>(),
        )
    };
    layer
}
