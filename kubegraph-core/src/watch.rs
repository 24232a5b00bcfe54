//! Types for the watch api.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::ErrorResponse;

/// A raw event returned from a watch query
///
/// A watch response carries many of these as newline separated JSON frames.
#[derive(Deserialize, Serialize, Clone)]
#[serde(tag = "type", content = "object", rename_all = "UPPERCASE")]
pub enum WatchEvent<K> {
    /// Resource was added
    Added(K),
    /// Resource was modified
    Modified(K),
    /// Resource was deleted
    Deleted(K),
    /// Bookmark; only its resourceVersion is meaningful
    Bookmark(serde_json::Value),
    /// There was some kind of error
    Error(ErrorResponse),
}

impl<K> Debug for WatchEvent<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self {
            WatchEvent::Added(_) => write!(f, "Added event"),
            WatchEvent::Modified(_) => write!(f, "Modified event"),
            WatchEvent::Deleted(_) => write!(f, "Deleted event"),
            WatchEvent::Bookmark(_) => write!(f, "Bookmark event"),
            WatchEvent::Error(e) => write!(f, "Error event: {e:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DynamicObject;

    #[test]
    fn decodes_watch_frames() {
        let frame = r#"{"type":"ADDED","object":{"kind":"ConfigMap","metadata":{"name":"a","namespace":"ns"}}}"#;
        let ev: WatchEvent<DynamicObject> = serde_json::from_str(frame).unwrap();
        match ev {
            WatchEvent::Added(obj) => assert_eq!(obj.store_key(), "ns/a"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn decodes_error_frames() {
        let frame = r#"{"type":"ERROR","object":{"message":"too old","reason":"Gone","code":410}}"#;
        let ev: WatchEvent<DynamicObject> = serde_json::from_str(frame).unwrap();
        match ev {
            WatchEvent::Error(status) => assert_eq!(status.code, 410),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
