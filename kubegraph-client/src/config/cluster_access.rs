//! Building a [`Config`] from a live cluster-access resource.
//!
//! Where the file-based path embeds credentials in the schema artifact, a
//! cluster-access resource references Secrets and ConfigMaps. Those are
//! fetched through an abstract [`SecretLookup`] so this module stays free
//! of any concrete control-plane client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::{utils::pem_certs, Config, Kubeconfig};
use crate::error::ConfigError;

const DEFAULT_NAMESPACE: &str = "default";
const TLS_CERT_KEY: &str = "tls.crt";
const TLS_KEY_KEY: &str = "tls.key";

/// A cluster-access resource: name plus connection spec.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterAccess {
    /// Resource name; becomes the served cluster name.
    pub name: String,
    /// Connection details.
    pub spec: ClusterAccessSpec,
}

/// Connection details of a cluster-access resource.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAccessSpec {
    /// API server URL. Required.
    #[serde(default)]
    pub host: String,
    /// Deprecated; accepted and ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Client authentication references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<ClusterAccessAuth>,
    /// Certificate authority source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca: Option<CaSpec>,
}

/// Reference to one key of a Secret or ConfigMap.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectKeyRef {
    /// Object name.
    pub name: String,
    /// Object namespace; `default` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Key within the object's data.
    pub key: String,
}

impl ObjectKeyRef {
    fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }
}

/// Authentication references, one of which is expected to be set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAccessAuth {
    /// Secret key holding a bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<ObjectKeyRef>,
    /// Secret key holding a kubeconfig document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig_secret_ref: Option<ObjectKeyRef>,
    /// TLS secret (`tls.crt`/`tls.key`) holding a client identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate_ref: Option<TlsSecretRef>,
}

/// Reference to a TLS secret.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSecretRef {
    /// Secret name.
    pub name: String,
    /// Secret namespace; `default` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Certificate authority source: inline PEM or a referenced object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaSpec {
    /// Inline PEM bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Secret key holding a PEM bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<ObjectKeyRef>,
    /// ConfigMap key holding a PEM bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<ObjectKeyRef>,
}

/// Abstract access to Secrets and ConfigMaps.
#[async_trait]
pub trait SecretLookup: Send + Sync {
    /// Fetch a Secret's decoded data, or `None` if it does not exist.
    async fn secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, tower::BoxError>;

    /// Fetch a ConfigMap's data, or `None` if it does not exist.
    async fn config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, tower::BoxError>;
}

async fn secret_value(
    lookup: &dyn SecretLookup,
    r: &ObjectKeyRef,
) -> Result<Vec<u8>, ConfigError> {
    let data = lookup
        .secret(r.namespace(), &r.name)
        .await
        .map_err(ConfigError::SecretLookup)?
        .unwrap_or_default();
    data.get(&r.key).cloned().ok_or_else(|| ConfigError::MissingAuthKey {
        kind: "secret",
        namespace: r.namespace().to_string(),
        name: r.name.clone(),
        key: r.key.clone(),
    })
}

async fn tls_secret_value(
    lookup: &dyn SecretLookup,
    r: &TlsSecretRef,
    key: &str,
) -> Result<Vec<u8>, ConfigError> {
    secret_value(
        lookup,
        &ObjectKeyRef {
            name: r.name.clone(),
            namespace: r.namespace.clone(),
            key: key.to_string(),
        },
    )
    .await
}

/// Build a [`Config`] from a cluster-access resource, resolving references
/// through `lookup`. Returns the config together with the served cluster
/// name.
pub async fn from_cluster_access(
    access: &ClusterAccess,
    lookup: &dyn SecretLookup,
) -> Result<(Config, String), ConfigError> {
    let spec = &access.spec;
    if spec.host.is_empty() {
        return Err(ConfigError::MissingHost);
    }
    let cluster_url = spec.host.parse::<http::Uri>().map_err(ConfigError::InvalidHost)?;
    let mut config = Config::new(cluster_url);

    if let Some(ca) = &spec.ca {
        let bundle: Option<Vec<u8>> = if let Some(data) = &ca.data {
            (!data.is_empty())
                .then(|| super::utils::b64_decode(data).map_err(ConfigError::BadCaEncoding))
                .transpose()?
        } else if let Some(r) = &ca.secret_ref {
            Some(secret_value(lookup, r).await?)
        } else if let Some(r) = &ca.config_map_ref {
            let data = lookup
                .config_map(r.namespace(), &r.name)
                .await
                .map_err(ConfigError::SecretLookup)?
                .unwrap_or_default();
            Some(
                data.get(&r.key)
                    .map(|v| v.clone().into_bytes())
                    .ok_or_else(|| ConfigError::MissingAuthKey {
                        kind: "configmap",
                        namespace: r.namespace().to_string(),
                        name: r.name.clone(),
                        key: r.key.clone(),
                    })?,
            )
        } else {
            None
        };
        if let Some(bundle) = bundle {
            config.root_cert = Some(pem_certs(&bundle)?);
            config.accept_invalid_certs = false;
        }
    }

    if let Some(auth) = &spec.auth {
        if let Some(r) = &auth.secret_ref {
            let token = secret_value(lookup, r).await?;
            let token = String::from_utf8_lossy(&token).trim().to_string();
            if !token.is_empty() {
                config.auth_info.token = Some(SecretString::from(token));
            }
        } else if let Some(r) = &auth.kubeconfig_secret_ref {
            let bytes = secret_value(lookup, r).await?;
            let kubeconfig = Kubeconfig::from_yaml_bytes(&bytes)?;
            config.apply_kubeconfig(&kubeconfig)?;
        } else if let Some(r) = &auth.client_certificate_ref {
            let mut pem = tls_secret_value(lookup, r, TLS_CERT_KEY).await?;
            let key = tls_secret_value(lookup, r, TLS_KEY_KEY).await?;
            if !pem.ends_with(b"\n") {
                pem.push(b'\n');
            }
            pem.extend_from_slice(&key);
            config.identity_pem = Some(pem);
        }
    }

    Ok((config, access.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    struct FakeLookup {
        secrets: BTreeMap<(String, String), BTreeMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl SecretLookup for FakeLookup {
        async fn secret(
            &self,
            namespace: &str,
            name: &str,
        ) -> Result<Option<BTreeMap<String, Vec<u8>>>, tower::BoxError> {
            Ok(self.secrets.get(&(namespace.to_string(), name.to_string())).cloned())
        }

        async fn config_map(
            &self,
            _namespace: &str,
            _name: &str,
        ) -> Result<Option<BTreeMap<String, String>>, tower::BoxError> {
            Ok(None)
        }
    }

    fn access(auth: Option<ClusterAccessAuth>) -> ClusterAccess {
        ClusterAccess {
            name: "prod".into(),
            spec: ClusterAccessSpec {
                host: "https://k.example:6443".into(),
                auth,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn token_from_secret_defaults_namespace() {
        let mut secrets = BTreeMap::new();
        secrets.insert(
            ("default".to_string(), "creds".to_string()),
            BTreeMap::from([("token".to_string(), b"t".to_vec())]),
        );
        let lookup = FakeLookup { secrets };
        let access = access(Some(ClusterAccessAuth {
            secret_ref: Some(ObjectKeyRef {
                name: "creds".into(),
                namespace: None,
                key: "token".into(),
            }),
            ..Default::default()
        }));
        let (config, name) = from_cluster_access(&access, &lookup).await.unwrap();
        assert_eq!(name, "prod");
        assert_eq!(config.auth_info.token.unwrap().expose_secret(), "t");
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let mut secrets = BTreeMap::new();
        secrets.insert(
            ("default".to_string(), "creds".to_string()),
            BTreeMap::from([("other".to_string(), b"x".to_vec())]),
        );
        let lookup = FakeLookup { secrets };
        let access = access(Some(ClusterAccessAuth {
            secret_ref: Some(ObjectKeyRef {
                name: "creds".into(),
                namespace: None,
                key: "token".into(),
            }),
            ..Default::default()
        }));
        let err = from_cluster_access(&access, &lookup).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingAuthKey { .. }));
    }
}
