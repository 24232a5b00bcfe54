//! The JSON-schema subset carried by schema artifacts.
//!
//! Definitions are JSON-schema shaped with the usual `x-kubernetes-*`
//! extensions. Only the parts the schema builder acts on are modeled;
//! everything else is ignored.

use std::collections::BTreeMap;

use kubegraph_core::{ApiResource, GroupVersionKind, ResourceScope};
use serde::Deserialize;
use serde_json::Value;

/// One resource definition from an artifact's definitions map.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Definition {
    /// Object properties.
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    /// Names of required properties.
    #[serde(default)]
    pub required: Vec<String>,
    /// The group/version/kind(s) this definition serves; the first entry is
    /// authoritative.
    #[serde(rename = "x-kubernetes-group-version-kind", default)]
    pub gvks: Vec<GvkExtension>,
    /// `Namespaced` or `Cluster`.
    #[serde(rename = "x-kubernetes-scope")]
    pub scope: Option<String>,
    /// Resource categories, e.g. `all`.
    #[serde(rename = "x-kubernetes-categories", default)]
    pub categories: Vec<String>,
}

/// The `x-kubernetes-group-version-kind` extension entry.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GvkExtension {
    /// API group; empty for the core group.
    #[serde(default)]
    pub group: String,
    /// Version.
    #[serde(default)]
    pub version: String,
    /// Kind.
    #[serde(default)]
    pub kind: String,
}

/// A JSON-schema property, recursively.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Property {
    /// The JSON type: `string`, `boolean`, `integer`, `number`, `object`,
    /// `array`.
    #[serde(rename = "type")]
    pub schema_type: Option<String>,
    /// Nested object properties.
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    /// Names of required nested properties.
    #[serde(default)]
    pub required: Vec<String>,
    /// Array item schema.
    pub items: Option<Box<Property>>,
    /// Free-form map values; `true` or a schema.
    #[serde(rename = "additionalProperties")]
    pub additional_properties: Option<Value>,
}

impl Property {
    /// Whether this property is a free-form map (no fixed properties).
    pub fn is_map(&self) -> bool {
        self.properties.is_empty() && self.additional_properties.is_some()
    }
}

/// A definition that resolved to a servable kind.
#[derive(Clone, Debug)]
pub struct KindDefinition {
    /// Addressing information, carrying the original group name.
    pub resource: ApiResource,
    /// The parsed definition body.
    pub definition: Definition,
}

impl KindDefinition {
    /// Interpret one entry of an artifact's definitions map.
    ///
    /// Returns `None` when the definition carries no usable GVK or no
    /// properties; such entries (shared structural types, status stubs)
    /// are not servable resources.
    pub fn from_value(value: &Value) -> Option<Self> {
        let definition: Definition = serde_json::from_value(value.clone()).ok()?;
        let gvk_ext = definition.gvks.first()?;
        if gvk_ext.kind.is_empty() || gvk_ext.version.is_empty() {
            return None;
        }
        if definition.properties.is_empty() {
            return None;
        }
        let gvk = GroupVersionKind::gvk(&gvk_ext.group, &gvk_ext.version, &gvk_ext.kind);
        let scope = definition
            .scope
            .as_deref()
            .map(ResourceScope::parse)
            .unwrap_or_default();
        Some(Self {
            resource: ApiResource::from_gvk(&gvk, scope),
            definition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_kind_definition() {
        let value = json!({
            "type": "object",
            "properties": {
                "metadata": { "type": "object" },
                "data": { "type": "object", "additionalProperties": { "type": "string" } },
            },
            "x-kubernetes-group-version-kind": [
                { "group": "", "version": "v1", "kind": "ConfigMap" }
            ],
            "x-kubernetes-scope": "Namespaced"
        });
        let kind = KindDefinition::from_value(&value).unwrap();
        assert_eq!(kind.resource.kind, "ConfigMap");
        assert_eq!(kind.resource.group, "");
        assert_eq!(kind.resource.plural, "configmaps");
        assert_eq!(kind.resource.scope, ResourceScope::Namespaced);
        assert!(kind.definition.properties["data"].is_map());
    }

    #[test]
    fn skips_definitions_without_gvk() {
        let value = json!({
            "type": "object",
            "properties": { "spec": { "type": "object" } }
        });
        assert!(KindDefinition::from_value(&value).is_none());
    }

    #[test]
    fn cluster_scope_is_detected() {
        let value = json!({
            "properties": { "spec": { "type": "object", "properties": { "x": { "type": "string" } } } },
            "x-kubernetes-group-version-kind": [
                { "group": "rbac.authorization.k8s.io", "version": "v1", "kind": "ClusterRole" }
            ],
            "x-kubernetes-scope": "Cluster"
        });
        let kind = KindDefinition::from_value(&value).unwrap();
        assert_eq!(kind.resource.scope, ResourceScope::Cluster);
    }
}
