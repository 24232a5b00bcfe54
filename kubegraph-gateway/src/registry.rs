//! The live set of served clusters, driven by schema-artifact files.
//!
//! Cluster names derive from artifact paths relative to the watched root:
//! extension stripped, subdirectories preserved as `/`-joined segments.
//! Readers take the shared lock; file events take the exclusive lock.
//! Clusters are built off-lock and only swapped in under the lock.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{cluster::TargetCluster, settings::Settings, Error, Result};

/// Mapping of cluster name to served cluster.
pub struct ClusterRegistry {
    settings: Arc<Settings>,
    root: PathBuf,
    clusters: RwLock<HashMap<String, Arc<TargetCluster>>>,
}

impl ClusterRegistry {
    /// Create an empty registry over the settings' watched root.
    pub fn new(settings: Arc<Settings>) -> Self {
        let root = settings.open_api_definitions_path.clone();
        Self {
            settings,
            root,
            clusters: RwLock::new(HashMap::new()),
        }
    }

    /// Derive the served name for an artifact path.
    pub fn cluster_name(&self, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let mut segments: Vec<String> = Vec::new();
        for comp in relative.components() {
            match comp {
                std::path::Component::Normal(seg) => segments.push(
                    seg.to_str()
                        .ok_or_else(|| Error::BadArtifactPath(path.to_path_buf()))?
                        .to_string(),
                ),
                _ => return Err(Error::BadArtifactPath(path.to_path_buf())),
            }
        }
        let Some(file) = segments.pop() else {
            return Err(Error::BadArtifactPath(path.to_path_buf()));
        };
        let stem = match file.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
            _ => file,
        };
        segments.push(stem);
        Ok(segments.join("/"))
    }

    /// Look up a served cluster by name.
    pub fn get(&self, name: &str) -> Option<Arc<TargetCluster>> {
        self.clusters.read().get(name).cloned()
    }

    /// Names of all served clusters.
    pub fn names(&self) -> Vec<String> {
        self.clusters.read().keys().cloned().collect()
    }

    /// Load an artifact file and register its cluster.
    ///
    /// The cluster is constructed before the write lock is taken; a
    /// previously registered cluster under the same name is replaced and
    /// cancelled.
    pub fn load(&self, path: &Path) -> Result<()> {
        let name = self.cluster_name(path)?;
        let cluster = Arc::new(TargetCluster::build(&name, path, &self.settings)?);
        tracing::info!(
            cluster = %name,
            url = %cluster.cluster_url(),
            "registered cluster endpoint /{name}/{}",
            self.settings.url.graphql_suffix
        );
        let previous = self.clusters.write().insert(name, cluster);
        if let Some(previous) = previous {
            previous.cancel();
        }
        Ok(())
    }

    /// Re-register a cluster after its artifact changed.
    ///
    /// Sequential remove-then-load: requests racing the update may observe
    /// a 404 window.
    pub fn update(&self, path: &Path) -> Result<()> {
        self.remove(path)?;
        self.load(path)
    }

    /// Unregister the cluster for an artifact path and cancel its work.
    pub fn remove(&self, path: &Path) -> Result<()> {
        let name = self.cluster_name(path)?;
        let removed = self.clusters.write().remove(&name);
        if let Some(cluster) = removed {
            tracing::info!(cluster = %name, "unregistered cluster");
            cluster.cancel();
        }
        Ok(())
    }

    /// Load or update, depending on whether the name is already served.
    pub fn upsert(&self, path: &Path) -> Result<()> {
        let name = self.cluster_name(path)?;
        if self.clusters.read().contains_key(&name) {
            self.update(path)
        } else {
            self.load(path)
        }
    }

    /// Sweep the watched root, loading every existing artifact.
    ///
    /// Failures are logged and skipped so one bad artifact does not keep
    /// the rest of the fleet from serving.
    pub fn load_existing(&self) {
        for path in collect_files(&self.root) {
            if let Err(err) = self.load(&path) {
                tracing::error!(path = %path.display(), %err, "failed to load schema artifact");
            }
        }
    }
}

fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}
