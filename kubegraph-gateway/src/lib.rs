//! Multi-tenant GraphQL gateway in front of Kubernetes-compatible API
//! servers.
//!
//! A watched directory of per-cluster schema artifacts drives the live set
//! of served clusters. Each artifact yields a GraphQL schema mirroring the
//! cluster's resource catalog plus an authenticated REST client; GraphQL
//! queries, mutations and subscriptions are translated into `list`, `get`,
//! `create`, merge-patch `update`, `delete` and `watch` calls issued with
//! end-user credentials.

pub mod cluster;
pub mod error;
pub mod registry;
pub mod resolvers;
pub mod schema;
pub mod server;
pub mod settings;
pub mod subscriptions;
pub mod watch_dir;

pub use cluster::TargetCluster;
pub use error::Error;
pub use registry::ClusterRegistry;
pub use settings::Settings;

/// Convenient alias for `Result<T, kubegraph_gateway::Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;
