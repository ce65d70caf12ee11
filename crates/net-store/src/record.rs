//! Stored form of a network

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use netd_network_core::{ConfigMap, NetworkChange, NetworkRecord};

/// A network record with its shared config plus the node-specific values of
/// each member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredNetwork {
    #[serde(flatten)]
    pub record: NetworkRecord,
    /// Node-specific values of members that have not written their own.
    #[serde(default, skip_serializing_if = "ConfigMap::is_empty")]
    pub node_defaults: ConfigMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_config: BTreeMap<String, ConfigMap>,
}

impl StoredNetwork {
    pub fn new(record: NetworkRecord, node_defaults: ConfigMap) -> Self {
        Self {
            record,
            node_defaults,
            node_config: BTreeMap::new(),
        }
    }

    /// The record as member `node` sees it.
    pub fn view(&self, node: &str) -> NetworkRecord {
        let mut record = self.record.clone();
        let own = self.node_config.get(node).unwrap_or(&self.node_defaults);
        record
            .config
            .extend(own.iter().map(|(key, value)| (key.clone(), value.clone())));
        record
    }

    pub fn apply(&mut self, node: &str, change: &NetworkChange) {
        if let Some(shared) = &change.shared {
            self.record.description = shared.description.clone();
            self.record.config = shared.config.clone();
        }
        self.node_config
            .insert(node.to_string(), change.node_config.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netd_network_core::{NetworkPut, NetworkStatus};

    fn config(pairs: &[(&str, &str)]) -> ConfigMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn stored() -> StoredNetwork {
        StoredNetwork::new(
            NetworkRecord {
                id: 1,
                name: "mv0".to_string(),
                driver: "macvlan".to_string(),
                description: String::new(),
                config: config(&[("mtu", "1500")]),
                status: NetworkStatus::Created,
            },
            config(&[("parent", "eth0")]),
        )
    }

    #[test]
    fn test_members_share_defaults_until_they_write() {
        let mut network = stored();
        assert_eq!(network.view("node2").config.get("parent").unwrap(), "eth0");

        network.apply(
            "node2",
            &NetworkChange {
                shared: None,
                node_config: config(&[("parent", "eth7")]),
            },
        );
        network.apply(
            "node1",
            &NetworkChange {
                shared: Some(NetworkPut::new("uplink", config(&[("mtu", "9000")]))),
                node_config: ConfigMap::new(),
            },
        );

        let on_node1 = network.view("node1");
        assert_eq!(on_node1.description, "uplink");
        assert_eq!(on_node1.config, config(&[("mtu", "9000")]));

        assert_eq!(
            network.view("node2").config,
            config(&[("mtu", "9000"), ("parent", "eth7")])
        );
        assert_eq!(
            network.view("node3").config,
            config(&[("mtu", "9000"), ("parent", "eth0")])
        );
    }

    #[test]
    fn test_json_keeps_record_fields_at_top_level() {
        let json = serde_json::to_value(stored()).unwrap();
        assert_eq!(json["type"], "macvlan");
        assert_eq!(json["node_defaults"]["parent"], "eth0");
        assert!(json.get("node_config").is_none());

        let parsed: StoredNetwork = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, stored());
    }
}
