use super::{auth::Auth, middleware::{AdminAuthLayer, ClusterUrlLayer}, tls};
use crate::{Config, Result};

/// Extensions to [`Config`](crate::Config) for building client stacks.
///
/// This trait is sealed and cannot be implemented outside this crate.
pub trait ConfigExt: private::Sealed {
    /// Layer resolving relative API paths against the configured server,
    /// injecting virtual-workspace cluster segments along the way.
    fn cluster_url_layer(&self) -> ClusterUrlLayer;

    /// Layer injecting the cluster's admin credentials into requests that
    /// carry no `Authorization` header.
    fn admin_auth_layer(&self) -> Result<AdminAuthLayer>;

    /// Create a `rustls::ClientConfig` based on this config.
    fn rustls_client_config(&self) -> Result<rustls::ClientConfig>;
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Config {}
}

impl ConfigExt for Config {
    fn cluster_url_layer(&self) -> ClusterUrlLayer {
        ClusterUrlLayer::new(self.cluster_url.clone())
    }

    fn admin_auth_layer(&self) -> Result<AdminAuthLayer> {
        let header = Auth::from(&self.auth_info).to_header()?;
        Ok(AdminAuthLayer::new(header))
    }

    fn rustls_client_config(&self) -> Result<rustls::ClientConfig> {
        tls::rustls_client_config(
            self.identity_pem.as_deref(),
            self.root_cert.as_deref(),
            self.accept_invalid_certs,
        )
        .map_err(crate::Error::Tls)
    }
}
