//! Cluster notification seam and node-specific config handling

use anyhow::Result;
use async_trait::async_trait;

use netd_shared_types::PeerRequest;

use crate::ConfigMap;

/// Config keys whose values only make sense on the node that set them. They
/// are never forwarded to other cluster members.
pub const NODE_SPECIFIC_NETWORK_CONFIG: &[&str] = &["bridge.external_interfaces", "parent"];

pub fn default_node_specific_keys() -> Vec<String> {
    NODE_SPECIFIC_NETWORK_CONFIG
        .iter()
        .map(|key| key.to_string())
        .collect()
}

/// Delivers a request to every other cluster member.
///
/// Implementations surface the first member failure. Receivers apply the
/// request as a peer notification and must not forward it again.
#[async_trait]
pub trait ClusterNotifier: Send + Sync {
    async fn notify(&self, request: &PeerRequest) -> Result<()>;
}

/// Fresh copy of `config` without node-specific keys, for forwarding.
pub fn strip_node_specific(config: &ConfigMap, node_specific_keys: &[String]) -> ConfigMap {
    config
        .iter()
        .filter(|(key, _)| !node_specific_keys.iter().any(|k| k == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Only the node-specific keys of `config`, as kept per member.
pub fn node_specific_only(config: &ConfigMap, node_specific_keys: &[String]) -> ConfigMap {
    config
        .iter()
        .filter(|(key, _)| node_specific_keys.iter().any(|k| k == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Config a receiving node applies: the forwarded config plus this node's own
/// values for node-specific keys.
pub fn merge_node_specific(
    local: &ConfigMap,
    incoming: &ConfigMap,
    node_specific_keys: &[String],
) -> ConfigMap {
    let mut merged = strip_node_specific(incoming, node_specific_keys);
    for key in node_specific_keys {
        if let Some(value) = local.get(key) {
            merged.insert(key.clone(), value.clone());
        }
    }

    merged
}
