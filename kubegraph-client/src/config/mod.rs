//! Cluster connection configuration built from schema-artifact metadata.
//!
//! The [`Config`] is the consumable product of the metadata codec: host,
//! CA material, and client credentials, ready to be turned into a
//! [`Client`](crate::Client).

mod cluster_access;
mod file_config;
mod utils;

pub use cluster_access::{
    from_cluster_access, CaSpec, ClusterAccess, ClusterAccessAuth, ClusterAccessSpec, ObjectKeyRef,
    SecretLookup, TlsSecretRef,
};
pub use file_config::{AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext};

use kubegraph_core::artifact::ClusterMetadata;
use secrecy::SecretString;

use crate::error::ConfigError;
use utils::{b64_decode, pem_certs};

const AUTH_TYPE_TOKEN: &str = "token";
const AUTH_TYPE_KUBECONFIG: &str = "kubeconfig";
const AUTH_TYPE_CLIENT_CERT: &str = "clientCert";

/// Configuration object detailing cluster URL, root certificates and
/// client credentials for one target cluster.
#[derive(Debug, Clone)]
pub struct Config {
    /// The configured cluster url
    pub cluster_url: http::Uri,
    /// The configured default namespace
    pub default_namespace: String,
    /// Root certificates, DER encoded
    pub root_cert: Option<Vec<Vec<u8>>>,
    /// Whether to accept invalid certificates
    ///
    /// Deliberately enabled when no CA bundle is supplied.
    pub accept_invalid_certs: bool,
    /// Client certificate and private key in PEM
    pub(crate) identity_pem: Option<Vec<u8>>,
    /// Admin credentials for the cluster
    pub(crate) auth_info: AuthInfo,
}

impl Config {
    /// Construct a new config where only the `cluster_url` is set
    pub fn new(cluster_url: http::Uri) -> Self {
        Self {
            cluster_url,
            default_namespace: String::from("default"),
            root_cert: None,
            accept_invalid_certs: true,
            identity_pem: None,
            auth_info: AuthInfo::default(),
        }
    }

    /// Build a config from the connection metadata embedded in a schema
    /// artifact.
    ///
    /// The host is required. A present, non-empty CA bundle enables TLS
    /// verification; an absent or empty one deliberately falls back to
    /// accepting any certificate. Credentials are applied according to the
    /// metadata's auth `type`; an unknown or empty type leaves the config
    /// unauthenticated.
    pub fn from_metadata(metadata: &ClusterMetadata) -> Result<Self, ConfigError> {
        if metadata.host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        let cluster_url = metadata
            .host
            .parse::<http::Uri>()
            .map_err(ConfigError::InvalidHost)?;

        let mut config = Config::new(cluster_url);

        if let Some(ca) = &metadata.ca {
            if !ca.data.is_empty() {
                let bundle = b64_decode(&ca.data).map_err(ConfigError::BadCaEncoding)?;
                config.root_cert = Some(pem_certs(&bundle)?);
                config.accept_invalid_certs = false;
            }
        }

        if let Some(auth) = &metadata.auth {
            match auth.kind.as_str() {
                AUTH_TYPE_TOKEN => {
                    let raw = auth.token.as_deref().unwrap_or_default();
                    let token = b64_decode(raw).map_err(ConfigError::Base64Decode)?;
                    let token = String::from_utf8_lossy(&token).trim().to_string();
                    // an empty token yields an unauthenticated config
                    if !token.is_empty() {
                        config.auth_info.token = Some(SecretString::from(token));
                    }
                }
                AUTH_TYPE_KUBECONFIG => {
                    let raw = auth.kubeconfig.as_deref().unwrap_or_default();
                    let bytes = b64_decode(raw).map_err(ConfigError::Base64Decode)?;
                    let kubeconfig = Kubeconfig::from_yaml_bytes(&bytes)?;
                    config.apply_kubeconfig(&kubeconfig)?;
                }
                AUTH_TYPE_CLIENT_CERT => {
                    // both halves must be present; a lone cert or key is skipped
                    if let (Some(cert), Some(key)) = (&auth.cert_data, &auth.key_data) {
                        let mut pem = b64_decode(cert).map_err(ConfigError::Base64Decode)?;
                        let key = b64_decode(key).map_err(ConfigError::Base64Decode)?;
                        if !pem.ends_with(b"\n") {
                            pem.push(b'\n');
                        }
                        pem.extend_from_slice(&key);
                        config.identity_pem = Some(pem);
                    } else {
                        tracing::debug!("client certificate auth skipped: cert or key missing");
                    }
                }
                other => {
                    tracing::debug!(auth_type = other, "no auth applied for metadata auth type");
                }
            }
        }

        Ok(config)
    }

    /// Extract credentials from an embedded kubeconfig's current context.
    fn apply_kubeconfig(&mut self, kubeconfig: &Kubeconfig) -> Result<(), ConfigError> {
        let user = kubeconfig.current_auth_info()?;

        // Highest precedence: a static bearer token.
        if let Some(token) = &user.token {
            self.auth_info.token = Some(token.clone());
            return Ok(());
        }
        if user.token_file.is_some() {
            return Err(ConfigError::NotImplemented("kubeconfig tokenFile"));
        }
        // Embedded client certificates beat on-disk paths.
        if let (Some(cert), Some(key)) = (&user.client_certificate_data, &user.client_key_data) {
            use secrecy::ExposeSecret;
            let mut pem = b64_decode(cert).map_err(ConfigError::Base64Decode)?;
            let key = b64_decode(key.expose_secret()).map_err(ConfigError::Base64Decode)?;
            if !pem.ends_with(b"\n") {
                pem.push(b'\n');
            }
            pem.extend_from_slice(&key);
            self.identity_pem = Some(pem);
            return Ok(());
        }
        if let (Some(cert_path), Some(key_path)) = (&user.client_certificate, &user.client_key) {
            let mut pem = utils::read_file(cert_path)?;
            if !pem.ends_with(b"\n") {
                pem.push(b'\n');
            }
            pem.extend_from_slice(&utils::read_file(key_path)?);
            self.identity_pem = Some(pem);
            return Ok(());
        }
        if let (Some(username), Some(password)) = (&user.username, &user.password) {
            self.auth_info.username = Some(username.clone());
            self.auth_info.password = Some(password.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use kubegraph_core::artifact::{AuthMetadata, CaMetadata};
    use secrecy::ExposeSecret;

    fn b64(s: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(s)
    }

    fn metadata(auth: Option<AuthMetadata>, ca: Option<CaMetadata>) -> ClusterMetadata {
        ClusterMetadata {
            host: "https://k.example:6443".into(),
            auth,
            ca,
            path: None,
        }
    }

    #[test]
    fn missing_host_fails_fast() {
        let md = ClusterMetadata::default();
        assert!(matches!(
            Config::from_metadata(&md),
            Err(ConfigError::MissingHost)
        ));
    }

    #[test]
    fn token_auth() {
        let md = metadata(
            Some(AuthMetadata {
                kind: "token".into(),
                token: Some(b64("t")),
                ..Default::default()
            }),
            None,
        );
        let config = Config::from_metadata(&md).unwrap();
        assert_eq!(config.auth_info.token.unwrap().expose_secret(), "t");
        // no CA supplied: insecure fallback
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn empty_token_is_unauthenticated() {
        let md = metadata(
            Some(AuthMetadata {
                kind: "token".into(),
                token: Some(String::new()),
                ..Default::default()
            }),
            None,
        );
        let config = Config::from_metadata(&md).unwrap();
        assert!(config.auth_info.token.is_none());
    }

    #[test]
    fn empty_ca_data_is_no_ca() {
        let md = metadata(None, Some(CaMetadata { data: String::new() }));
        let config = Config::from_metadata(&md).unwrap();
        assert!(config.root_cert.is_none());
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn bad_ca_encoding_is_rejected() {
        let md = metadata(None, Some(CaMetadata { data: "%%%".into() }));
        assert!(matches!(
            Config::from_metadata(&md),
            Err(ConfigError::BadCaEncoding(_))
        ));
    }

    #[test]
    fn lone_client_cert_is_skipped() {
        let md = metadata(
            Some(AuthMetadata {
                kind: "clientCert".into(),
                cert_data: Some(b64("cert")),
                ..Default::default()
            }),
            None,
        );
        let config = Config::from_metadata(&md).unwrap();
        assert!(config.identity_pem.is_none());
    }

    #[test]
    fn unknown_auth_type_applies_nothing() {
        let md = metadata(
            Some(AuthMetadata {
                kind: "oidc".into(),
                ..Default::default()
            }),
            None,
        );
        let config = Config::from_metadata(&md).unwrap();
        assert!(config.auth_info.token.is_none());
        assert!(config.identity_pem.is_none());
    }

    #[test]
    fn kubeconfig_token_auth() {
        let kc = r#"
apiVersion: v1
kind: Config
current-context: test
contexts:
- name: test
  context:
    cluster: test
    user: admin
clusters:
- name: test
  cluster:
    server: https://ignored.example
users:
- name: admin
  user:
    token: sekrit
"#;
        let md = metadata(
            Some(AuthMetadata {
                kind: "kubeconfig".into(),
                kubeconfig: Some(b64(kc)),
                ..Default::default()
            }),
            None,
        );
        let config = Config::from_metadata(&md).unwrap();
        assert_eq!(config.auth_info.token.unwrap().expose_secret(), "sekrit");
        // the artifact host wins over the kubeconfig's server
        assert_eq!(config.cluster_url.to_string(), "https://k.example:6443/");
    }

    #[test]
    fn kubeconfig_token_file_is_not_implemented() {
        let kc = r#"
current-context: test
contexts:
- name: test
  context:
    cluster: test
    user: admin
users:
- name: admin
  user:
    tokenFile: /var/run/token
"#;
        let md = metadata(
            Some(AuthMetadata {
                kind: "kubeconfig".into(),
                kubeconfig: Some(b64(kc)),
                ..Default::default()
            }),
            None,
        );
        assert!(matches!(
            Config::from_metadata(&md),
            Err(ConfigError::NotImplemented(_))
        ));
    }
}
