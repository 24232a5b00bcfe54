//! Resource addressing: scope, plural names, and url paths.

use serde::{Deserialize, Serialize};

use crate::gvk::GroupVersionKind;

/// Whether a resource lives in a namespace or at cluster level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResourceScope {
    /// Namespaced resources sit under `/namespaces/{ns}/` in their url path.
    #[default]
    Namespaced,
    /// Cluster-scoped resources have no namespace segment.
    Cluster,
}

impl ResourceScope {
    /// Parse the `x-kubernetes-scope` extension value.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("cluster") {
            ResourceScope::Cluster
        } else {
            ResourceScope::Namespaced
        }
    }
}

/// Enough information about an API resource to address it over REST.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct ApiResource {
    /// Resource group, empty for the core group.
    pub group: String,
    /// Group version.
    pub version: String,
    /// apiVersion of the resource (`v1` for core, `group/version` otherwise).
    pub api_version: String,
    /// Singular PascalCase name of the resource.
    pub kind: String,
    /// Plural name of the resource.
    pub plural: String,
    /// Namespaced or cluster scope.
    pub scope: ResourceScope,
}

impl ApiResource {
    /// Creates an ApiResource from group, version and kind.
    ///
    /// The plural name is guessed with the usual English rules; schema
    /// artifacts do not carry plural names.
    pub fn from_gvk(gvk: &GroupVersionKind, scope: ResourceScope) -> Self {
        ApiResource {
            group: gvk.group.clone(),
            version: gvk.version.clone(),
            api_version: gvk.api_version(),
            kind: gvk.kind.clone(),
            plural: to_plural(&gvk.kind.to_ascii_lowercase()),
            scope,
        }
    }

    /// The GVK this resource addresses.
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }

    /// Creates a url path for http requests for this resource.
    ///
    /// The namespace segment is only emitted for namespaced resources.
    pub fn url_path(&self, namespace: Option<&str>) -> String {
        let n = match (self.scope, namespace) {
            (ResourceScope::Namespaced, Some(ns)) => format!("namespaces/{ns}/"),
            _ => String::new(),
        };
        format!(
            "/{root}/{api_version}/{n}{plural}",
            root = if self.group.is_empty() { "api" } else { "apis" },
            api_version = self.api_version,
            plural = self.plural,
        )
    }
}

/// Pluralize a lowercased ASCII kind the way the API machinery names its
/// resources.
///
/// Schema artifacts carry no plural names, so resource paths have to be
/// guessed: sibilant endings take `-es`, a trailing `y` after a consonant
/// becomes `-ies`, everything else appends `s`. Kinds that are already
/// collective nouns pass through unchanged.
pub fn to_plural(word: &str) -> String {
    if matches!(word, "endpoints" | "endpointslices") {
        return word.to_owned();
    }

    let is_vowel = |c: &char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u');
    let mut tail = word.chars().rev();
    match (tail.next(), tail.next()) {
        (Some('s' | 'x' | 'z'), _) | (Some('h'), Some('c' | 's')) => format!("{word}es"),
        (Some('y'), Some(c)) if !is_vowel(&c) => format!("{}ies", &word[..word.len() - 1]),
        _ => format!("{word}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plurals() {
        assert_eq!(to_plural("configmap"), "configmaps");
        assert_eq!(to_plural("ingress"), "ingresses");
        assert_eq!(to_plural("networkpolicy"), "networkpolicies");
        assert_eq!(to_plural("endpoints"), "endpoints");
    }

    #[test]
    fn url_paths() {
        let core = ApiResource::from_gvk(
            &GroupVersionKind::gvk("", "v1", "ConfigMap"),
            ResourceScope::Namespaced,
        );
        assert_eq!(core.url_path(Some("default")), "/api/v1/namespaces/default/configmaps");
        assert_eq!(core.url_path(None), "/api/v1/configmaps");

        let grouped = ApiResource::from_gvk(
            &GroupVersionKind::gvk("batch", "v1", "Job"),
            ResourceScope::Namespaced,
        );
        assert_eq!(grouped.url_path(Some("ns")), "/apis/batch/v1/namespaces/ns/jobs");

        let cluster = ApiResource::from_gvk(
            &GroupVersionKind::gvk("rbac.authorization.k8s.io", "v1", "ClusterRole"),
            ResourceScope::Cluster,
        );
        // namespace is ignored for cluster-scoped resources
        assert_eq!(
            cluster.url_path(Some("default")),
            "/apis/rbac.authorization.k8s.io/v1/clusterroles"
        );
    }
}
