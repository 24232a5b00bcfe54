//! Field-path diffing between object revisions.
//!
//! A subscription only re-emits a modified object when a field the client
//! actually selected changed. Paths are compared by deep equality, and a
//! field appearing or disappearing counts as a change.

use serde_json::Value;

/// A dotted field path split into segments, e.g. `["metadata", "name"]`.
pub type FieldPath = Vec<String>;

/// Whether any of `paths` differs between `old` and `new`.
///
/// An empty path set compares the whole tree.
pub fn paths_changed(old: &Value, new: &Value, paths: &[FieldPath]) -> bool {
    if paths.is_empty() {
        return old != new;
    }
    paths.iter().any(|path| lookup(old, path) != lookup(new, path))
}

fn lookup<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut cur = value;
    for seg in path {
        cur = cur.get(seg)?;
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> FieldPath {
        p.split('.').map(String::from).collect()
    }

    #[test]
    fn unselected_change_is_ignored() {
        let old = json!({"metadata": {"name": "c", "annotations": {}}, "data": {"app": "x"}});
        let new = json!({"metadata": {"name": "c", "annotations": {"foo": "bar"}}, "data": {"app": "x"}});
        assert!(!paths_changed(&old, &new, &[path("metadata.name"), path("data")]));
    }

    #[test]
    fn selected_change_is_detected() {
        let old = json!({"data": {"app": "x"}});
        let new = json!({"data": {"app": "y"}});
        assert!(paths_changed(&old, &new, &[path("data")]));
        assert!(paths_changed(&old, &new, &[path("data.app")]));
    }

    #[test]
    fn presence_difference_is_a_change() {
        let old = json!({"data": {}});
        let new = json!({"data": {"app": "x"}});
        assert!(paths_changed(&old, &new, &[path("data.app")]));

        let gone = json!({});
        assert!(paths_changed(&new, &gone, &[path("data.app")]));
    }

    #[test]
    fn empty_path_set_compares_whole_tree() {
        let old = json!({"a": 1});
        let new = json!({"a": 2});
        assert!(paths_changed(&old, &new, &[]));
        assert!(!paths_changed(&old, &old.clone(), &[]));
    }
}
