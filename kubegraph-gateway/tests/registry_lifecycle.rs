//! Registry lifecycle against real artifact files plus HTTP dispatch.

use std::sync::Arc;

use axum::body::Body as AxumBody;
use base64::Engine;
use http::{Request, StatusCode};
use kubegraph_gateway::{registry::ClusterRegistry, server, settings::Settings};
use serde_json::json;
use tower::ServiceExt;

fn artifact(host: &str) -> String {
    let token = base64::engine::general_purpose::STANDARD.encode("t");
    json!({
        "components": { "schemas": {
            "io.k8s.api.core.v1.ConfigMap": {
                "type": "object",
                "properties": {
                    "metadata": { "type": "object" },
                    "data": { "type": "object", "additionalProperties": { "type": "string" } }
                },
                "x-kubernetes-group-version-kind": [
                    { "group": "", "version": "v1", "kind": "ConfigMap" }
                ],
                "x-kubernetes-scope": "Namespaced"
            }
        } },
        "x-cluster-metadata": {
            "host": host,
            "auth": { "type": "token", "token": token }
        }
    })
    .to_string()
}

fn setup(dir: &std::path::Path) -> (Arc<ClusterRegistry>, Arc<Settings>) {
    let settings = Arc::new(Settings {
        open_api_definitions_path: dir.to_path_buf(),
        ..Default::default()
    });
    (Arc::new(ClusterRegistry::new(settings.clone())), settings)
}

#[tokio::test]
async fn load_update_remove_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prod.json");
    std::fs::write(&path, artifact("https://k.example:6443")).unwrap();
    let (registry, _) = setup(dir.path());

    registry.load(&path).unwrap();
    let cluster = registry.get("prod").expect("cluster registered");
    assert_eq!(cluster.name(), "prod");
    assert_eq!(cluster.cluster_url().to_string(), "https://k.example:6443/");
    assert!(cluster.schema().sdl().contains("ConfigMaps"));
    assert_eq!(cluster.source_path(), path);

    // update points the cluster at new metadata
    std::fs::write(&path, artifact("https://k2.example:6443")).unwrap();
    registry.update(&path).unwrap();
    let updated = registry.get("prod").expect("cluster still registered");
    assert_eq!(updated.cluster_url().to_string(), "https://k2.example:6443/");

    // removal cancels in-flight work and unregisters
    let token = updated.cancel_token();
    assert!(!token.is_cancelled());
    registry.remove(&path).unwrap();
    assert!(registry.get("prod").is_none());
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn startup_sweep_loads_subdirectories() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("teams")).unwrap();
    std::fs::write(dir.path().join("prod.json"), artifact("https://k.example:6443")).unwrap();
    std::fs::write(
        dir.path().join("teams/alpha.json"),
        artifact("https://alpha.example:6443"),
    )
    .unwrap();
    // a broken artifact is skipped, not fatal
    std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();

    let (registry, _) = setup(dir.path());
    registry.load_existing();

    let mut names = registry.names();
    names.sort();
    assert_eq!(names, vec!["prod".to_string(), "teams/alpha".to_string()]);
}

#[tokio::test]
async fn artifacts_without_host_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nohost.json");
    std::fs::write(&path, json!({ "x-cluster-metadata": {} }).to_string()).unwrap();
    let (registry, _) = setup(dir.path());
    assert!(registry.load(&path).is_err());
    assert!(registry.get("nohost").is_none());
}

#[tokio::test]
async fn dispatch_unknown_cluster_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, settings) = setup(dir.path());
    let app = server::router(registry, settings);

    let response = app
        .oneshot(
            Request::post("/prod/graphql")
                .header("authorization", "Bearer t")
                .header("content-type", "application/json")
                .body(AxumBody::from(r#"{"query":"{ __typename }"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dispatch_without_token_is_401() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prod.json");
    std::fs::write(&path, artifact("https://k.example:6443")).unwrap();
    let (registry, settings) = setup(dir.path());
    registry.load(&path).unwrap();
    let app = server::router(registry, settings);

    let response = app
        .oneshot(
            Request::post("/prod/graphql")
                .header("content-type", "application/json")
                .body(AxumBody::from(r#"{"query":"{ __typename }"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn removed_cluster_stops_serving() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prod.json");
    std::fs::write(&path, artifact("https://k.example:6443")).unwrap();
    let (registry, settings) = setup(dir.path());
    registry.load(&path).unwrap();

    let app = server::router(registry.clone(), settings);
    let request = |app: axum::Router| async move {
        app.oneshot(
            Request::post("/prod/graphql")
                .header("authorization", "Bearer t")
                .header("content-type", "application/json")
                .body(AxumBody::from(r#"{"query":"{ __typename }"}"#))
                .unwrap(),
        )
        .await
        .unwrap()
    };

    let response = request(app.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);

    registry.remove(&path).unwrap();
    let response = request(app).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_serves_graphiql_page() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prod.json");
    std::fs::write(&path, artifact("https://k.example:6443")).unwrap();
    let (registry, settings) = setup(dir.path());
    registry.load(&path).unwrap();
    let app = server::router(registry, settings);

    let response = app
        .oneshot(Request::get("/prod/graphql").body(AxumBody::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("graphiql"));
}

#[tokio::test]
async fn healthz_answers_without_clusters() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, settings) = setup(dir.path());
    let app = server::router(registry, settings);
    let response = app
        .oneshot(Request::get("/healthz").body(AxumBody::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
