//! Per-cluster REST client and authenticating transport for the kubegraph
//! gateway.
//!
//! A [`Config`] is built from a schema artifact's embedded connection
//! metadata (or from a live cluster-access resource) and turned into a
//! [`Client`]: a tower service stack over a TLS'd hyper client. The stack
//! carries the per-request authentication chain — virtual-workspace URL
//! rewriting, discovery bypass, end-user token enforcement, header
//! scrubbing, and optional impersonation — driven by a [`RequestContext`]
//! attached to each outbound request as an extension.

pub mod client;
pub mod config;
mod context;
pub mod error;

pub use client::{Body, Client, ConfigExt, TransportOptions};
pub use config::{Config, SecretLookup};
pub use context::RequestContext;
pub use error::{AuthError, ConfigError, Error};

/// Convenient alias for `Result<T, kubegraph_client::Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;
