//! A schemaless representation of upstream objects.
//!
//! Upstream payloads are JSON trees whose shape is only known from the
//! cluster's schema artifact, so the gateway works on raw [`Value`]s with a
//! thin accessor layer for the handful of fields it must reason about.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::gvk::GroupVersionKind;

/// A dynamic representation of an API object.
///
/// Works with any non-list object; the full payload (including `metadata`)
/// lives in `data`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(transparent)]
pub struct DynamicObject {
    /// The raw object tree.
    pub data: Value,
}

impl DynamicObject {
    /// Wrap a raw JSON tree.
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// Create an empty object stamped with type information.
    #[must_use]
    pub fn typed(gvk: &GroupVersionKind) -> Self {
        Self::new(serde_json::json!({
            "apiVersion": gvk.api_version(),
            "kind": gvk.kind,
            "metadata": {},
        }))
    }

    /// Set type information on the wrapped tree, overwriting what is there.
    pub fn set_gvk(&mut self, gvk: &GroupVersionKind) {
        if let Some(map) = self.data.as_object_mut() {
            map.insert("apiVersion".into(), Value::String(gvk.api_version()));
            map.insert("kind".into(), Value::String(gvk.kind.clone()));
        }
    }

    /// `metadata.name`, if present.
    pub fn name(&self) -> Option<&str> {
        self.data.pointer("/metadata/name").and_then(Value::as_str)
    }

    /// `metadata.namespace`, if present.
    pub fn namespace(&self) -> Option<&str> {
        self.data.pointer("/metadata/namespace").and_then(Value::as_str)
    }

    /// Attach a namespace to the wrapped tree.
    pub fn set_namespace(&mut self, ns: &str) {
        if let Some(meta) = self
            .data
            .as_object_mut()
            .map(|m| m.entry("metadata").or_insert_with(|| Value::Object(Default::default())))
            .and_then(Value::as_object_mut)
        {
            meta.insert("namespace".into(), Value::String(ns.into()));
        }
    }

    /// Tracking key used by watch sessions: `namespace/name`.
    pub fn store_key(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or(""), self.name().unwrap_or(""))
    }

    /// Read a field by dotted path, e.g. `metadata.labels.app`.
    pub fn field(&self, dotted: &str) -> Option<&Value> {
        let mut cur = &self.data;
        for seg in dotted.split('.') {
            cur = cur.get(seg)?;
        }
        Some(cur)
    }
}

impl From<Value> for DynamicObject {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

/// The shape of list responses: we only need `items`.
#[derive(Deserialize, Debug, Default)]
pub struct ObjectList {
    /// Objects in the collection.
    #[serde(default)]
    pub items: Vec<DynamicObject>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let obj = DynamicObject::new(serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "c", "namespace": "default" },
            "data": { "app": "x" }
        }));
        assert_eq!(obj.name(), Some("c"));
        assert_eq!(obj.namespace(), Some("default"));
        assert_eq!(obj.store_key(), "default/c");
        assert_eq!(obj.field("data.app").and_then(Value::as_str), Some("x"));
        assert_eq!(obj.field("data.missing"), None);
    }

    #[test]
    fn typed_sets_api_version() {
        let gvk = GroupVersionKind::gvk("batch", "v1", "Job");
        let obj = DynamicObject::typed(&gvk);
        assert_eq!(
            obj.data.get("apiVersion").and_then(Value::as_str),
            Some("batch/v1")
        );
        assert_eq!(obj.data.get("kind").and_then(Value::as_str), Some("Job"));
    }

    #[test]
    fn set_namespace_creates_metadata() {
        let mut obj = DynamicObject::new(serde_json::json!({ "kind": "Widget" }));
        obj.set_namespace("tenants");
        assert_eq!(obj.namespace(), Some("tenants"));
    }
}
