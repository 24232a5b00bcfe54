//! The per-cluster schema artifact and its embedded connection metadata.
//!
//! An artifact is a JSON document produced by the schema listener for one
//! cluster. It carries the cluster's resource definitions (JSON-schema
//! shaped, with `x-kubernetes-*` extensions) plus an `x-cluster-metadata`
//! object describing how to reach and authenticate against the cluster.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Key under which connection metadata is embedded in an artifact.
pub const CLUSTER_METADATA_KEY: &str = "x-cluster-metadata";

/// Connection metadata for one target cluster.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterMetadata {
    /// API server URL. Required; an empty host makes the cluster unusable.
    #[serde(default)]
    pub host: String,
    /// Client authentication material.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthMetadata>,
    /// Certificate authority bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca: Option<CaMetadata>,
    /// Deprecated; decoded for compatibility and ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Authentication payload, discriminated by `type`.
///
/// Exactly one payload field is expected for each discriminator; an unknown
/// or empty `type` means no client authentication is applied.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthMetadata {
    /// One of `token`, `kubeconfig`, `clientCert`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// base64-encoded bearer token (`type: token`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// base64-encoded kubeconfig document (`type: kubeconfig`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
    /// base64-encoded PEM client certificate (`type: clientCert`).
    #[serde(rename = "certData", skip_serializing_if = "Option::is_none")]
    pub cert_data: Option<String>,
    /// base64-encoded PEM client key (`type: clientCert`).
    #[serde(rename = "keyData", skip_serializing_if = "Option::is_none")]
    pub key_data: Option<String>,
}

/// Certificate authority bundle; empty data means "verify with system roots
/// disabled" (insecure fallback), not an error.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CaMetadata {
    /// base64-encoded PEM bundle.
    #[serde(default)]
    pub data: String,
}

/// A parsed schema artifact: the definitions map plus connection metadata.
#[derive(Clone, Debug, Default)]
pub struct SchemaArtifact {
    /// Kind name -> JSON-schema definition with `x-kubernetes-*` extensions.
    pub definitions: Map<String, Value>,
    /// Embedded connection metadata, when present.
    pub metadata: Option<ClusterMetadata>,
}

impl SchemaArtifact {
    /// Decode an artifact from raw file bytes.
    ///
    /// Definitions are looked up under `components.schemas` first, then a
    /// top-level `definitions` map. A missing definitions map yields an
    /// empty schema rather than an error; malformed JSON or structurally
    /// invalid metadata fail fast.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let doc: Value = serde_json::from_slice(bytes).map_err(Error::BadSchemaArtifact)?;

        let metadata = match doc.get(CLUSTER_METADATA_KEY) {
            Some(raw) => Some(
                serde_json::from_value::<ClusterMetadata>(raw.clone())
                    .map_err(Error::BadClusterMetadata)?,
            ),
            None => None,
        };

        let definitions = doc
            .pointer("/components/schemas")
            .or_else(|| doc.get("definitions"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Ok(Self { definitions, metadata })
    }
}
