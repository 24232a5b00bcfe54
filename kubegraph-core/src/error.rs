//! Error handling in [`kubegraph-core`][crate]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error payload returned by an API server, also embedded in watch
/// streams as `ERROR` frames.
#[derive(Error, Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[error("{message}: {reason}")]
pub struct ErrorResponse {
    /// Status of the response, usually `Failure`
    #[serde(default)]
    pub status: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Machine-readable reason
    #[serde(default)]
    pub reason: String,
    /// HTTP status code
    #[serde(default)]
    pub code: u16,
}

/// Possible errors from client-less operations
#[derive(Error, Debug)]
pub enum Error {
    /// A schema artifact could not be decoded
    #[error("invalid schema artifact: {0}")]
    BadSchemaArtifact(#[source] serde_json::Error),

    /// A schema artifact carried structurally invalid cluster metadata
    #[error("invalid cluster metadata: {0}")]
    BadClusterMetadata(#[source] serde_json::Error),

    /// Failed to build a request
    #[error("failed to build request: {0}")]
    BuildRequest(#[source] http::Error),

    /// Failed to serialize a request body
    #[error("failed to serialize body: {0}")]
    SerializeBody(#[source] serde_json::Error),

    /// A request validation failed
    #[error("request validation failed: {0}")]
    Validation(String),

    /// A label selector did not parse
    #[error("invalid label selector {selector:?}: {reason}")]
    BadSelector {
        /// The selector as received
        selector: String,
        /// Why it was rejected
        reason: String,
    },
}
