use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SharedTypeError;

/// Network config keys and values. Ordered so that persisted records and
/// diff output are stable.
pub type ConfigMap = BTreeMap<String, String>;

/// Coarse lifecycle state of a network, owned by the driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    Created,
    #[default]
    Pending,
    Errored,
    Unknown,
}

impl std::fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkStatus::Created => write!(f, "Created"),
            NetworkStatus::Pending => write!(f, "Pending"),
            NetworkStatus::Errored => write!(f, "Errored"),
            NetworkStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for NetworkStatus {
    type Err = SharedTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(NetworkStatus::Created),
            "pending" => Ok(NetworkStatus::Pending),
            "errored" => Ok(NetworkStatus::Errored),
            "unknown" => Ok(NetworkStatus::Unknown),
            _ => Err(SharedTypeError::InvalidValue {
                field: "status",
                value: s.to_string(),
            }),
        }
    }
}

/// Mutable part of a network: what an update carries and what a diff
/// snapshot restores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NetworkPut {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ConfigMap,
}

impl NetworkPut {
    pub fn new(description: impl Into<String>, config: ConfigMap) -> Self {
        Self {
            description: description.into(),
            config,
        }
    }
}

/// Request to create a new network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub driver: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ConfigMap,
}

/// Persisted form of a network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkRecord {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub driver: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default)]
    pub status: NetworkStatus,
}

impl NetworkRecord {
    pub fn from_create(id: i64, request: NetworkCreate) -> Self {
        Self {
            id,
            name: request.name,
            driver: request.driver,
            description: request.description,
            config: request.config,
            status: NetworkStatus::Pending,
        }
    }

    pub fn put(&self) -> NetworkPut {
        NetworkPut::new(self.description.clone(), self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            "created".parse::<NetworkStatus>().unwrap(),
            NetworkStatus::Created
        );
        assert_eq!(
            "Errored".parse::<NetworkStatus>().unwrap(),
            NetworkStatus::Errored
        );
        assert!("running".parse::<NetworkStatus>().is_err());
    }

    #[test]
    fn test_record_json_uses_type_key() {
        let mut config = ConfigMap::new();
        config.insert("ipv4.address".to_string(), "10.0.0.1/24".to_string());
        let record = NetworkRecord::from_create(
            7,
            NetworkCreate {
                name: "lxdbr0".to_string(),
                driver: "bridge".to_string(),
                description: String::new(),
                config,
            },
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "bridge");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["config"]["ipv4.address"], "10.0.0.1/24");
    }
}
