//! Tower middleware making up the per-request transport chain.
//!
//! Outermost to innermost on the cluster client stack: user auth → admin
//! authorization → cluster URL assembly (virtual-workspace injection plus
//! base anchoring).

mod admin_auth;
mod cluster_url;
mod user_auth;

pub use admin_auth::{AdminAuth, AdminAuthLayer};
pub use cluster_url::{ClusterUrl, ClusterUrlLayer};
pub use user_auth::{UserAuth, UserAuthLayer, UserAuthParams};
