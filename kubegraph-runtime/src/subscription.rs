//! Subscription sessions: seen-object tracking and emission decisions.

use std::collections::BTreeMap;

use kubegraph_core::{DynamicObject, WatchEvent};
use serde_json::Value;

use crate::diff::{paths_changed, FieldPath};

/// State for one live subscription.
///
/// Tracks the objects seen so far, keyed `namespace/name`, and decides per
/// watch event whether the client should receive a new value.
#[derive(Debug)]
pub struct WatchSession {
    /// `Some(key)` pins the session to a single object; `None` is a list
    /// subscription.
    target: Option<String>,
    /// Emit every `Modified` event regardless of the selection set.
    subscribe_to_all: bool,
    /// Field paths the client selected.
    field_paths: Vec<FieldPath>,
    seen: BTreeMap<String, DynamicObject>,
}

impl WatchSession {
    /// A session following a single `(namespace, name)` object.
    pub fn item(
        namespace: &str,
        name: &str,
        subscribe_to_all: bool,
        field_paths: Vec<FieldPath>,
    ) -> Self {
        Self {
            target: Some(format!("{namespace}/{name}")),
            subscribe_to_all,
            field_paths,
            seen: BTreeMap::new(),
        }
    }

    /// A session following a whole collection.
    pub fn list(subscribe_to_all: bool, field_paths: Vec<FieldPath>) -> Self {
        Self {
            target: None,
            subscribe_to_all,
            field_paths,
            seen: BTreeMap::new(),
        }
    }

    /// Apply one watch event. Returns the value to emit, if any.
    ///
    /// Single-object sessions emit the tracked object (or `Null` once it is
    /// deleted); list sessions emit the full current set sorted by name.
    pub fn apply(&mut self, event: WatchEvent<DynamicObject>) -> Option<Value> {
        let (obj, kind) = match event {
            WatchEvent::Added(obj) => (obj, EventKind::Added),
            WatchEvent::Modified(obj) => (obj, EventKind::Modified),
            WatchEvent::Deleted(obj) => (obj, EventKind::Deleted),
            // bookmarks and errors are handled by the watcher
            _ => return None,
        };
        let key = obj.store_key();
        if let Some(target) = &self.target {
            if &key != target {
                return None;
            }
        }

        let emit = match kind {
            EventKind::Added => {
                self.seen.insert(key, obj);
                true
            }
            EventKind::Modified => {
                let changed = self.subscribe_to_all
                    || self
                        .seen
                        .get(&key)
                        .map(|old| paths_changed(&old.data, &obj.data, &self.field_paths))
                        .unwrap_or(true);
                self.seen.insert(key, obj);
                changed
            }
            EventKind::Deleted => {
                self.seen.remove(&key);
                true
            }
        };
        emit.then(|| self.current_value())
    }

    /// The value a client would currently observe.
    pub fn current_value(&self) -> Value {
        match &self.target {
            Some(key) => self
                .seen
                .get(key)
                .map(|obj| obj.data.clone())
                .unwrap_or(Value::Null),
            None => {
                let mut items: Vec<&DynamicObject> = self.seen.values().collect();
                items.sort_by_key(|obj| obj.name().unwrap_or_default().to_string());
                Value::Array(items.into_iter().map(|obj| obj.data.clone()).collect())
            }
        }
    }
}

enum EventKind {
    Added,
    Modified,
    Deleted,
}
