use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kubegraph_gateway::{registry::ClusterRegistry, server, settings::Args, watch_dir, Error};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        tracing::error!(%err, "gateway failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let settings = Arc::new(Args::parse().into_settings()?);
    if settings.local_development {
        tracing::warn!("local development mode: end-user authentication is disabled");
    }

    let registry = Arc::new(ClusterRegistry::new(settings.clone()));
    registry.load_existing();

    let watch_registry = registry.clone();
    let watch_root = settings.open_api_definitions_path.clone();
    tokio::spawn(async move {
        if let Err(err) = watch_dir::run(watch_registry, &watch_root).await {
            tracing::error!(%err, "file watcher stopped");
        }
    });

    let app = server::router(registry, settings.clone());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.gateway.port));
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(Error::Server)?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Error::Server)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}
