//! Error handling in [`kubegraph-client`][crate]
use std::path::PathBuf;

pub use kubegraph_core::ErrorResponse;
use thiserror::Error;

/// Possible errors when working with a cluster client
#[derive(Error, Debug)]
pub enum Error {
    /// The API server rejected the request
    ///
    /// This can be parsed into as an error handling fallback. It is also
    /// carried in `ERROR` frames from watch calls.
    #[error("api error: {0}")]
    Api(#[source] ErrorResponse),

    /// Hyper error
    #[error("client error: {0}")]
    HyperError(#[from] hyper::Error),

    /// Service error from the tower stack
    #[error("service error: {0}")]
    Service(#[source] tower::BoxError),

    /// UTF-8 error
    #[error("UTF-8 error: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),

    /// Returned on `std::io::Error` when reading an event stream
    #[error("error reading events stream: {0}")]
    ReadEvents(#[source] std::io::Error),

    /// Http based error
    #[error("http error: {0}")]
    HttpError(#[from] http::Error),

    /// Common error case when parsing responses into known shapes
    #[error("error deserializing response: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// Error building a request
    #[error("error building request: {0}")]
    BuildRequest(#[source] kubegraph_core::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Per-request authentication failed
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// An error with configuring TLS occurred
    #[error("TLS error: {0}")]
    Tls(#[from] crate::client::tls::Error),
}

/// Possible errors when building a cluster [`Config`](crate::Config)
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Connection metadata carried no host
    #[error("cluster metadata has no host")]
    MissingHost,

    /// The host was not a parseable URI
    #[error("invalid cluster host: {0}")]
    InvalidHost(#[source] http::uri::InvalidUri),

    /// CA bundle was not valid base64
    #[error("failed to decode certificate authority data: {0}")]
    BadCaEncoding(#[source] base64::DecodeError),

    /// CA bundle decoded but contained no certificates
    #[error("failed to parse certificate authority bundle: {0}")]
    BadCaBundle(#[source] pem::PemError),

    /// An auth payload was not valid base64
    #[error("failed to decode auth data: {0}")]
    Base64Decode(#[source] base64::DecodeError),

    /// An embedded kubeconfig did not parse
    #[error("failed to parse kubeconfig: {0}")]
    BadKubeconfig(#[source] serde_yaml::Error),

    /// Kubeconfig has no usable current context
    #[error("failed to determine current context")]
    CurrentContextNotSet,

    /// Kubeconfig names a context that does not exist
    #[error("failed to load current context: {context_name}")]
    LoadContext {
        /// Name of the missing context
        context_name: String,
    },

    /// Kubeconfig names a user that does not exist
    #[error("failed to find named user: {user_name}")]
    FindUser {
        /// Name of the missing user
        user_name: String,
    },

    /// An auth mechanism that the gateway does not support yet
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A referenced secret or configmap did not carry the expected key
    #[error("key {key:?} missing from {kind} {namespace}/{name}")]
    MissingAuthKey {
        /// `secret` or `configmap`
        kind: &'static str,
        /// Namespace of the referenced object
        namespace: String,
        /// Name of the referenced object
        name: String,
        /// The missing key
        key: String,
    },

    /// Secret lookup backend failure
    #[error("secret lookup failed: {0}")]
    SecretLookup(#[source] tower::BoxError),

    /// Failed to read a file referenced from a kubeconfig
    #[error("failed to read {path:?}: {source}")]
    ReadFile {
        /// The path that could not be read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Possible errors from the per-request authentication chain
#[derive(Error, Debug)]
pub enum AuthError {
    /// No end-user token was attached to the request
    #[error("request carries no bearer token")]
    MissingToken,

    /// The bearer token did not parse as a JWT
    #[error("failed to parse bearer token: {0}")]
    UnparsableJwt(#[source] jsonwebtoken::errors::Error),

    /// The configured claim was missing, empty or not a string
    #[error("token carries no usable {claim:?} claim")]
    InvalidClaim {
        /// The claim that was looked up
        claim: String,
    },

    /// A header value could not be constructed from credentials
    #[error("invalid authorization header: {0}")]
    InvalidHeader(#[source] http::header::InvalidHeaderValue),
}
