//! Persistent network store seam
//!
//! A network has one description and one config shared by every cluster
//! member, plus per-member values for the node-specific keys. Reads return
//! the view of one member: the shared config with that member's values laid
//! over it. A member that never wrote its own values sees the ones given at
//! creation.

use anyhow::Result;
use async_trait::async_trait;

use netd_shared_types::{NetworkPut, NetworkRecord};

use crate::ConfigMap;

/// What one member writes on update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkChange {
    /// New shared description and config, without node-specific keys.
    /// `None` leaves them as they are.
    pub shared: Option<NetworkPut>,
    /// The member's complete set of node-specific values.
    pub node_config: ConfigMap,
}

/// Authoritative store of network records. Each call is atomic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkStore: Send + Sync {
    /// Insert a new record and return its assigned id. Fails if the name is
    /// taken. `record.config` is the shared config, `node_config` the
    /// node-specific values every member starts with.
    async fn create_network(&self, record: &NetworkRecord, node_config: &ConfigMap)
        -> Result<i64>;

    /// The record as member `node` sees it.
    async fn get_network(&self, name: &str, node: &str) -> Result<Option<NetworkRecord>>;

    /// Every record as member `node` sees it, ordered by name.
    async fn list_networks(&self, node: &str) -> Result<Vec<NetworkRecord>>;

    async fn update_network(&self, name: &str, node: &str, change: &NetworkChange) -> Result<()>;

    async fn delete_network(&self, name: &str) -> Result<()>;

    /// Fails if `new_name` is taken.
    async fn rename_network(&self, old_name: &str, new_name: &str) -> Result<()>;
}
