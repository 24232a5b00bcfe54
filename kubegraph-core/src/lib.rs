//! Shared types and client-less behavior for the kubegraph gateway.
//!
//! This crate holds everything the gateway needs to talk *about* clusters
//! without talking *to* them: the schema-artifact codec, group/version/kind
//! types, the dynamic object representation, label selectors, and the HTTP
//! request builder used by resolvers and the watch engine.

pub mod artifact;
pub mod dynamic;
pub mod error;
pub mod gvk;
pub mod params;
pub mod request;
pub mod resource;
pub mod selector;
pub mod watch;

pub use artifact::{AuthMetadata, CaMetadata, ClusterMetadata, SchemaArtifact};
pub use dynamic::{DynamicObject, ObjectList};
pub use error::{Error, ErrorResponse};
pub use gvk::{GroupVersion, GroupVersionKind, ParseGroupVersionError};
pub use params::{ListParams, Patch};
pub use request::Request;
pub use resource::{ApiResource, ResourceScope};
pub use selector::Selector;
pub use watch::WatchEvent;

/// Convenient alias for `Result<T, kubegraph_core::Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;
