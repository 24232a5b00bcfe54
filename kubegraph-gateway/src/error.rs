//! Error handling in the gateway binary.
use thiserror::Error;

/// Possible errors while running the gateway
#[derive(Error, Debug)]
pub enum Error {
    /// A schema artifact failed to decode
    #[error("failed to read schema artifact: {0}")]
    Artifact(#[from] kubegraph_core::Error),

    /// Cluster configuration could not be built from artifact metadata
    #[error("failed to build cluster config: {0}")]
    Config(#[from] kubegraph_client::error::ConfigError),

    /// The cluster client stack could not be assembled
    #[error("failed to build cluster client: {0}")]
    Client(#[from] kubegraph_client::Error),

    /// The artifact's definitions did not produce a usable schema
    #[error("failed to build GraphQL schema: {0}")]
    Schema(#[from] crate::schema::BuildError),

    /// An artifact path was outside the watched root or not representable
    #[error("artifact path {0:?} is not usable as a cluster name")]
    BadArtifactPath(std::path::PathBuf),

    /// Reading an artifact file failed
    #[error("failed to read {path:?}: {source}")]
    ReadArtifact {
        /// Artifact path
        path: std::path::PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The settings file failed to load
    #[error("failed to load settings: {0}")]
    Settings(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The file watcher could not be started
    #[error("failed to watch {path:?}: {source}")]
    Watch {
        /// Watched directory
        path: std::path::PathBuf,
        /// Underlying watcher error
        #[source]
        source: notify::Error,
    },

    /// Binding or serving the HTTP listener failed
    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
}
