//! Collaborators shared by every network on a node

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cluster::{default_node_specific_keys, ClusterNotifier};
use crate::store::NetworkStore;
use crate::usage::{
    DeviceReferenceCheck, EmptyUsageSource, InstanceSource, NetworkReferenceCheck, ProfileSource,
    UsageScanner,
};

/// Default daemon state directory
pub const DEFAULT_VAR_DIR: &str = "/var/lib/netd";

/// Locations of on-disk network resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPaths {
    var_dir: PathBuf,
}

impl NetworkPaths {
    pub fn new(var_dir: impl Into<PathBuf>) -> Self {
        Self {
            var_dir: var_dir.into(),
        }
    }

    pub fn var_dir(&self) -> &Path {
        &self.var_dir
    }

    pub fn networks_dir(&self) -> PathBuf {
        self.var_dir.join("networks")
    }

    /// Directory holding the resources of network `name`.
    pub fn network_dir(&self, name: &str) -> PathBuf {
        self.networks_dir().join(name)
    }
}

impl Default for NetworkPaths {
    fn default() -> Self {
        Self::new(DEFAULT_VAR_DIR)
    }
}

/// Node-wide state handed to every network entity.
#[derive(Clone)]
pub struct DaemonContext {
    pub node_name: String,
    pub paths: NetworkPaths,
    pub store: Arc<dyn NetworkStore>,
    pub notifier: Arc<dyn ClusterNotifier>,
    pub instances: Arc<dyn InstanceSource>,
    pub profiles: Arc<dyn ProfileSource>,
    pub references: Arc<dyn NetworkReferenceCheck>,
    pub node_specific_keys: Vec<String>,
}

impl DaemonContext {
    /// Create a context with no instances or profiles and the default
    /// node-specific keys.
    pub fn new(
        node_name: impl Into<String>,
        paths: NetworkPaths,
        store: Arc<dyn NetworkStore>,
        notifier: Arc<dyn ClusterNotifier>,
    ) -> Self {
        Self {
            node_name: node_name.into(),
            paths,
            store,
            notifier,
            instances: Arc::new(EmptyUsageSource),
            profiles: Arc::new(EmptyUsageSource),
            references: Arc::new(DeviceReferenceCheck),
            node_specific_keys: default_node_specific_keys(),
        }
    }

    pub fn with_usage_sources(
        mut self,
        instances: Arc<dyn InstanceSource>,
        profiles: Arc<dyn ProfileSource>,
    ) -> Self {
        self.instances = instances;
        self.profiles = profiles;
        self
    }

    pub fn with_reference_check(mut self, references: Arc<dyn NetworkReferenceCheck>) -> Self {
        self.references = references;
        self
    }

    pub fn with_node_specific_keys(mut self, keys: Vec<String>) -> Self {
        self.node_specific_keys = keys;
        self
    }

    pub fn usage_scanner(&self) -> UsageScanner<'_> {
        UsageScanner::new(
            self.instances.as_ref(),
            self.profiles.as_ref(),
            self.references.as_ref(),
        )
    }
}

impl std::fmt::Debug for DaemonContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonContext")
            .field("node_name", &self.node_name)
            .field("paths", &self.paths)
            .field("node_specific_keys", &self.node_specific_keys)
            .finish_non_exhaustive()
    }
}
