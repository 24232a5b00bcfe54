//! End-to-end GraphQL execution against a mocked upstream transport.
//!
//! The full per-request chain is assembled over a canned service, so these
//! tests observe exactly what the upstream would: method, path, headers and
//! body of every translated REST call.

use std::sync::{Arc, Mutex};

use assert_json_diff::assert_json_eq;
use http::{header::AUTHORIZATION, Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use kubegraph_client::{
    client::middleware::{AdminAuthLayer, UserAuthLayer, UserAuthParams},
    Body, Client, RequestContext,
};
use kubegraph_gateway::schema::build_schema;
use serde_json::{json, Value};
use tower::ServiceBuilder;

#[derive(Clone, Debug)]
struct Call {
    method: Method,
    path: String,
    query: Option<String>,
    authorization: Option<String>,
    body: Value,
}

type Responder = Arc<dyn Fn(&Method, &str) -> (StatusCode, Value) + Send + Sync>;

/// A client whose stack ends in a canned responder instead of a socket.
fn mock_client(responder: Responder, calls: Arc<Mutex<Vec<Call>>>) -> Client {
    let service = tower::service_fn(move |req: Request<Body>| {
        let responder = responder.clone();
        let calls = calls.clone();
        async move {
            let (parts, body) = req.into_parts();
            let body_bytes = body.collect().await.map(|b| b.to_bytes()).unwrap_or_default();
            let body_json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
            calls.lock().unwrap().push(Call {
                method: parts.method.clone(),
                path: parts.uri.path().to_string(),
                query: parts.uri.query().map(String::from),
                authorization: parts
                    .headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from),
                body: body_json,
            });
            let (status, payload) = responder(&parts.method, parts.uri.path());
            let mut resp = Response::new(Body::from(payload.to_string().into_bytes()));
            *resp.status_mut() = status;
            Ok::<_, std::convert::Infallible>(resp)
        }
    });
    let service = ServiceBuilder::new()
        .layer(UserAuthLayer::new(UserAuthParams::default()))
        .layer(AdminAuthLayer::new(Some(http::HeaderValue::from_static(
            "Bearer admin-abc",
        ))))
        .service(service);
    Client::new(service, "default")
}

fn definitions() -> serde_json::Map<String, Value> {
    json!({
        "io.k8s.api.core.v1.ConfigMap": {
            "type": "object",
            "properties": {
                "apiVersion": { "type": "string" },
                "kind": { "type": "string" },
                "metadata": { "type": "object" },
                "data": { "type": "object", "additionalProperties": { "type": "string" } }
            },
            "x-kubernetes-group-version-kind": [
                { "group": "", "version": "v1", "kind": "ConfigMap" }
            ],
            "x-kubernetes-scope": "Namespaced"
        },
        "com.example.v1.Widget": {
            "type": "object",
            "properties": {
                "metadata": { "type": "object" },
                "spec": {
                    "type": "object",
                    "properties": {
                        "size": { "type": "integer" },
                        "color": { "type": "string" }
                    },
                    "required": ["size"]
                }
            },
            "x-kubernetes-group-version-kind": [
                { "group": "example.com", "version": "v1", "kind": "Widget" }
            ],
            "x-kubernetes-scope": "Cluster"
        }
    })
    .as_object()
    .cloned()
    .unwrap()
}

fn configmap(name: &str, data: Value) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": { "name": name, "namespace": "default" },
        "data": data
    })
}

fn harness(responder: Responder) -> (async_graphql::dynamic::Schema, Arc<Mutex<Vec<Call>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let client = mock_client(responder, calls.clone());
    let schema = build_schema(&definitions(), client).expect("schema builds");
    (schema, calls)
}

async fn execute(
    schema: &async_graphql::dynamic::Schema,
    query: &str,
) -> async_graphql::Response {
    schema
        .execute(async_graphql::Request::new(query).data(RequestContext::with_token("t")))
        .await
}

#[tokio::test]
async fn sdl_exposes_expected_surface() {
    let (schema, _) = harness(Arc::new(|_, _| (StatusCode::OK, json!({}))));
    let sdl = schema.sdl();
    // hierarchical query/mutation roots and flat subscriptions
    assert!(sdl.contains("type CoreGroup"), "missing group type:\n{sdl}");
    assert!(sdl.contains("type CoreGroupV1"));
    assert!(sdl.contains("ConfigMaps"));
    assert!(sdl.contains("createConfigMap"));
    assert!(sdl.contains("updateConfigMap"));
    assert!(sdl.contains("deleteConfigMap"));
    assert!(sdl.contains("v1CoreConfigMap"));
    assert!(sdl.contains("v1CoreConfigMaps"));
    assert!(sdl.contains("type Metadata"));
    assert!(sdl.contains("scalar StringMap"));
    // grouped CRD surfaces under its sanitized group
    assert!(sdl.contains("type Example_comGroup") || sdl.contains("example_com"));
}

#[tokio::test]
async fn list_translates_to_rest_with_user_credentials() {
    let (schema, calls) = harness(Arc::new(|_, _| {
        (
            StatusCode::OK,
            json!({ "items": [ configmap("b", json!({"k": "2"})), configmap("a", json!({"k": "1"})) ] }),
        )
    }));

    let response = execute(
        &schema,
        r#"{ core { v1 { ConfigMaps(namespace: "default") { metadata { name namespace } data } } } }"#,
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);

    let data = response.data.into_json().unwrap();
    // results come back sorted by name
    assert_json_eq!(
        data,
        json!({ "core": { "v1": { "ConfigMaps": [
            { "metadata": { "name": "a", "namespace": "default" }, "data": { "k": "1" } },
            { "metadata": { "name": "b", "namespace": "default" }, "data": { "k": "2" } },
        ] } } })
    );

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::GET);
    assert_eq!(calls[0].path, "/api/v1/namespaces/default/configmaps");
    // the transport chain replaced admin credentials with the user token
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer t"));
}

#[tokio::test]
async fn promoted_fields_serve_from_the_group_root() {
    let (schema, _) = harness(Arc::new(|_, _| {
        (StatusCode::OK, json!({ "items": [ configmap("a", json!({})) ] }))
    }));
    let response = execute(&schema, r#"{ core { ConfigMaps { metadata { name } } } }"#).await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
}

#[tokio::test]
async fn get_requires_name_and_namespace() {
    let (schema, calls) = harness(Arc::new(|_, _| (StatusCode::OK, configmap("c", json!({})))));
    let response = execute(
        &schema,
        r#"{ core { v1 { ConfigMap(name: "c", namespace: "default") { metadata { name } } } } }"#,
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        calls.lock().unwrap()[0].path,
        "/api/v1/namespaces/default/configmaps/c"
    );

    // missing required arguments fail validation without upstream traffic
    let before = calls.lock().unwrap().len();
    let response = execute(&schema, r#"{ core { v1 { ConfigMap { metadata { name } } } } }"#).await;
    assert!(!response.errors.is_empty());
    assert_eq!(calls.lock().unwrap().len(), before);
}

#[tokio::test]
async fn upstream_errors_land_in_the_errors_array() {
    let (schema, _) = harness(Arc::new(|_, _| {
        (
            StatusCode::NOT_FOUND,
            json!({ "status": "Failure", "message": "configmaps \"x\" not found", "reason": "NotFound", "code": 404 }),
        )
    }));
    let response = execute(
        &schema,
        r#"{ core { v1 { ConfigMap(name: "x", namespace: "default") { metadata { name } } } } }"#,
    )
    .await;
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].message.contains("not found"));
    assert!(!response.errors[0].path.is_empty());
}

#[tokio::test]
async fn create_merges_input_onto_typed_wrapper() {
    let (schema, calls) = harness(Arc::new(|method, _| {
        if *method == Method::POST {
            (StatusCode::CREATED, configmap("fresh", json!({"k": "v"})))
        } else {
            (StatusCode::OK, json!({}))
        }
    }));

    let response = execute(
        &schema,
        r#"mutation {
            core { v1 { createConfigMap(
                namespace: "default",
                object: { metadata: { name: "fresh" }, data: { k: "v" } }
            ) { metadata { name } data } } }
        }"#,
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);

    let calls = calls.lock().unwrap();
    assert_eq!(calls[0].method, Method::POST);
    assert_eq!(calls[0].path, "/api/v1/namespaces/default/configmaps");
    assert_eq!(calls[0].body.pointer("/apiVersion"), Some(&json!("v1")));
    assert_eq!(calls[0].body.pointer("/kind"), Some(&json!("ConfigMap")));
    assert_eq!(calls[0].body.pointer("/metadata/name"), Some(&json!("fresh")));
    assert_eq!(calls[0].body.pointer("/metadata/namespace"), Some(&json!("default")));
}

#[tokio::test]
async fn create_without_name_is_rejected_before_upstream() {
    let (schema, calls) = harness(Arc::new(|_, _| (StatusCode::OK, json!({}))));
    let response = execute(
        &schema,
        r#"mutation { core { v1 { createConfigMap(namespace: "default", object: { data: { k: "v" } }) { data } } } }"#,
    )
    .await;
    assert!(!response.errors.is_empty());
    assert!(response.errors[0].message.contains("metadata.name"));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn update_fetches_then_merge_patches() {
    let (schema, calls) = harness(Arc::new(|method, _| {
        if *method == Method::GET {
            (StatusCode::OK, configmap("c", json!({"old": "1"})))
        } else if *method == Method::PATCH {
            (StatusCode::OK, configmap("c", json!({"old": "1", "new": "2"})))
        } else {
            (StatusCode::OK, json!({}))
        }
    }));

    let response = execute(
        &schema,
        r#"mutation { core { v1 { updateConfigMap(
            namespace: "default",
            object: { metadata: { name: "c" }, data: { new: "2" } }
        ) { data } } } }"#,
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].method, Method::GET);
    assert_eq!(calls[1].method, Method::PATCH);
    assert_eq!(calls[1].path, "/api/v1/namespaces/default/configmaps/c");
    // the patch body is exactly the user's partial object
    assert_json_eq!(
        calls[1].body,
        json!({ "metadata": { "name": "c" }, "data": { "new": "2" } })
    );
}

#[tokio::test]
async fn delete_returns_true() {
    let (schema, calls) = harness(Arc::new(|_, _| (StatusCode::OK, json!({"status": "Success"}))));
    let response = execute(
        &schema,
        r#"mutation { core { v1 { deleteConfigMap(name: "c", namespace: "default") } } }"#,
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data.pointer("/core/v1/deleteConfigMap"), Some(&json!(true)));
    assert_eq!(calls.lock().unwrap()[0].method, Method::DELETE);
}

#[tokio::test]
async fn cluster_scoped_kinds_omit_namespaces() {
    let (schema, calls) = harness(Arc::new(|_, _| {
        (StatusCode::OK, json!({ "items": [] }))
    }));
    let response = execute(&schema, r#"{ example_com { v1 { Widgets { metadata { name } } } } }"#).await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(calls.lock().unwrap()[0].path, "/apis/example.com/v1/widgets");
}

#[tokio::test]
async fn bad_label_selectors_are_rejected() {
    let (schema, calls) = harness(Arc::new(|_, _| (StatusCode::OK, json!({ "items": [] }))));
    let response = execute(
        &schema,
        r#"{ core { v1 { ConfigMaps(labelselector: "app in (") { metadata { name } } } } }"#,
    )
    .await;
    assert!(!response.errors.is_empty());
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn label_selectors_are_forwarded() {
    let (schema, calls) = harness(Arc::new(|_, _| (StatusCode::OK, json!({ "items": [] }))));
    let response = execute(
        &schema,
        r#"{ core { v1 { ConfigMaps(labelselector: "app=web") { metadata { name } } } } }"#,
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let calls = calls.lock().unwrap();
    assert!(calls[0].query.as_deref().unwrap_or("").contains("labelSelector=app%3Dweb"));
}

#[tokio::test]
async fn requests_without_token_never_reach_upstream() {
    let (schema, calls) = harness(Arc::new(|_, _| (StatusCode::OK, json!({ "items": [] }))));
    // no RequestContext data: the transport chain synthesizes a 401
    let response = schema
        .execute(async_graphql::Request::new(
            r#"{ core { v1 { ConfigMaps { metadata { name } } } } }"#,
        ))
        .await;
    assert!(!response.errors.is_empty());
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn introspection_works_without_upstream() {
    let (schema, calls) = harness(Arc::new(|_, _| (StatusCode::OK, json!({}))));
    let response = execute(&schema, r#"{ __schema { queryType { name } } }"#).await;
    assert!(response.errors.is_empty());
    assert!(calls.lock().unwrap().is_empty());
}
