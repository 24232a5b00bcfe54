//! Directory watching: file events drive registry mutations.
//!
//! A single dispatch task consumes filesystem events and applies them to
//! the registry; the watcher thread itself never touches the registry's
//! write path.

use std::{path::Path, sync::Arc};

use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::{registry::ClusterRegistry, Error, Result};

/// Watch the registry's root and apply events until the channel closes.
///
/// Holds the watcher for the duration of the loop; dropping the future
/// stops watching.
pub async fn run(registry: Arc<ClusterRegistry>, root: &Path) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<notify::Result<Event>>(64);
    let mut watcher = notify::recommended_watcher(move |res| {
        // the watcher runs on its own thread; losing events on shutdown is fine
        let _ = tx.blocking_send(res);
    })
    .map_err(|source| Error::Watch {
        path: root.to_path_buf(),
        source,
    })?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|source| Error::Watch {
            path: root.to_path_buf(),
            source,
        })?;
    tracing::info!(root = %root.display(), "watching schema artifacts");

    while let Some(event) = rx.recv().await {
        match event {
            Ok(event) => apply(&registry, &event),
            Err(err) => tracing::warn!(%err, "file watcher error"),
        }
    }
    Ok(())
}

fn apply(registry: &ClusterRegistry, event: &Event) {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in &event.paths {
                // renames surface as modify events on paths that no longer exist
                let result = if path.is_file() {
                    registry.upsert(path)
                } else if !path.exists() {
                    registry.remove(path)
                } else {
                    Ok(())
                };
                if let Err(err) = result {
                    tracing::error!(path = %path.display(), %err, "failed to apply file event");
                }
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                if let Err(err) = registry.remove(path) {
                    tracing::error!(path = %path.display(), %err, "failed to remove cluster");
                }
            }
        }
        _ => {}
    }
}
