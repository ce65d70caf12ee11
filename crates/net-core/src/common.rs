//! Base network entity embedded by every driver
//!
//! Holds identity and mutable state of one network on this node, and
//! implements the cluster-aware mutations shared by all drivers. An update is
//! applied in memory first, then forwarded to the other cluster members (when
//! this node received the original request), then persisted. Updates and
//! renames received from a peer are only applied locally, which keeps a
//! forwarded request from being forwarded again.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, MutexGuard};

use netd_shared_types::{ClusterHeartbeat, NetworkPut, NetworkRecord, NetworkStatus, PeerRequest};

use crate::cluster::{node_specific_only, strip_node_specific};
use crate::context::DaemonContext;
use crate::dhcp::{dhcp_ranges_v4, dhcp_ranges_v6, DhcpRange};
use crate::error::{NetworkError, ValidationError};
use crate::logging::LogContext;
use crate::rules::is_true;
use crate::store::NetworkChange;
use crate::validate::{is_user_key, FieldValidator, ValidationRules};
use crate::{ConfigMap, Result};

/// Where a mutating call comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOrigin {
    /// The original request, received by this node.
    Local,
    /// A copy forwarded by the node that received the original request.
    PeerNotification,
}

impl MutationOrigin {
    pub fn is_peer_notification(self) -> bool {
        self == MutationOrigin::PeerNotification
    }
}

/// Result of comparing a proposed description and config with the current ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDiff {
    /// Description or any config value differs.
    pub changed: bool,
    /// Non-`user.` keys whose value differs, without duplicates.
    pub changed_keys: Vec<String>,
    /// Copy of the description and config before the change, for rolling back.
    pub previous: NetworkPut,
}

/// Held while one update, rename or delete of a network runs.
pub struct MutationGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

#[derive(Debug)]
struct NetworkState {
    log: LogContext,
    id: i64,
    name: String,
    driver: String,
    description: String,
    config: ConfigMap,
    status: NetworkStatus,
    deleted: bool,
}

/// State and behaviour common to all network drivers.
pub struct NetworkCommon {
    ctx: Arc<DaemonContext>,
    state: RwLock<NetworkState>,
    // Serializes update, rename and delete on this network.
    mutation: Mutex<()>,
}

impl NetworkCommon {
    pub fn new(ctx: Arc<DaemonContext>, record: NetworkRecord) -> Self {
        let state = NetworkState {
            log: LogContext::new(&record.driver, &record.name),
            id: record.id,
            name: record.name,
            driver: record.driver,
            description: record.description,
            config: record.config,
            status: record.status,
            deleted: false,
        };

        Self {
            ctx,
            state: RwLock::new(state),
            mutation: Mutex::new(()),
        }
    }

    /// (Re)initialise identity and log context.
    fn init(
        &self,
        id: i64,
        name: String,
        driver: String,
        description: String,
        config: ConfigMap,
        status: NetworkStatus,
    ) {
        let mut state = self.state.write();
        state.log = LogContext::new(&driver, &name);
        state.id = id;
        state.name = name;
        state.driver = driver;
        state.description = description;
        state.config = config;
        state.status = status;
    }

    pub fn context(&self) -> &Arc<DaemonContext> {
        &self.ctx
    }

    pub fn log(&self) -> LogContext {
        self.state.read().log.clone()
    }

    pub fn id(&self) -> i64 {
        self.state.read().id
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn driver(&self) -> String {
        self.state.read().driver.clone()
    }

    pub fn status(&self) -> NetworkStatus {
        self.state.read().status
    }

    pub fn set_status(&self, status: NetworkStatus) {
        self.state.write().status = status;
    }

    pub fn description(&self) -> String {
        self.state.read().description.clone()
    }

    pub fn config(&self) -> ConfigMap {
        self.state.read().config.clone()
    }

    pub fn config_value(&self, key: &str) -> Option<String> {
        self.state.read().config.get(key).cloned()
    }

    pub fn is_deleted(&self) -> bool {
        self.state.read().deleted
    }

    /// Current state as a persistable record.
    pub fn record(&self) -> NetworkRecord {
        let state = self.state.read();
        NetworkRecord {
            id: state.id,
            name: state.name.clone(),
            driver: state.driver.clone(),
            description: state.description.clone(),
            config: state.config.clone(),
            status: state.status,
        }
    }

    fn dhcp_enabled(&self, key: &str) -> bool {
        let state = self.state.read();
        match state.config.get(key) {
            None => true,
            Some(value) => value.is_empty() || is_true(value),
        }
    }

    /// DHCPv4 is on unless `ipv4.dhcp` is set to a false value.
    pub fn has_dhcpv4(&self) -> bool {
        self.dhcp_enabled("ipv4.dhcp")
    }

    /// DHCPv6 is on unless `ipv6.dhcp` is set to a false value. This includes
    /// stateless SLAAC router advertisements.
    pub fn has_dhcpv6(&self) -> bool {
        self.dhcp_enabled("ipv6.dhcp")
    }

    pub fn dhcpv4_ranges(&self) -> Vec<DhcpRange<Ipv4Addr>> {
        let state = self.state.read();
        state
            .config
            .get("ipv4.dhcp.ranges")
            .map(|ranges| dhcp_ranges_v4(ranges))
            .unwrap_or_default()
    }

    pub fn dhcpv6_ranges(&self) -> Vec<DhcpRange<Ipv6Addr>> {
        let state = self.state.read();
        state
            .config
            .get("ipv6.dhcp.ranges")
            .map(|ranges| dhcp_ranges_v6(ranges))
            .unwrap_or_default()
    }

    /// Validate `config` against the common rules merged with `driver_rules`.
    pub fn validate(&self, config: &ConfigMap, driver_rules: ValidationRules) -> Result<()> {
        FieldValidator::new().validate(&self.name(), config, driver_rules)
    }

    /// Whether any instance or profile references this network.
    pub async fn is_used(&self) -> Result<bool> {
        let name = self.name();
        self.ctx.usage_scanner().is_used(&name).await
    }

    /// Compare `new` with the current description and config.
    pub fn config_changed(&self, new: &NetworkPut) -> ConfigDiff {
        let previous = {
            let state = self.state.read();
            NetworkPut::new(state.description.clone(), state.config.clone())
        };

        let mut changed = new.description != previous.description;
        let mut changed_keys: Vec<String> = Vec::new();

        let old_side = previous
            .config
            .iter()
            .map(|(key, value)| (key, value.as_str(), new.config.get(key)));
        let new_side = new
            .config
            .iter()
            .map(|(key, value)| (key, value.as_str(), previous.config.get(key)));

        for (key, value, other) in old_side.chain(new_side) {
            if other.map(String::as_str).unwrap_or_default() == value {
                continue;
            }

            changed = true;
            if !is_user_key(key) && !changed_keys.iter().any(|k| k == key) {
                changed_keys.push(key.clone());
            }
        }

        ConfigDiff {
            changed,
            changed_keys,
            previous,
        }
    }

    fn live_name(&self) -> Result<String> {
        let state = self.state.read();
        if state.deleted {
            return Err(NetworkError::Deleted {
                network: state.name.clone(),
            });
        }

        Ok(state.name.clone())
    }

    /// An update aimed at a single member may only change node-specific keys.
    fn check_member_change(&self, network: &str, put: &NetworkPut) -> Result<()> {
        let keys = &self.ctx.node_specific_keys;
        let state = self.state.read();

        let key = if put.description != state.description {
            Some("description".to_string())
        } else {
            let current = strip_node_specific(&state.config, keys);
            let proposed = strip_node_specific(&put.config, keys);
            current
                .keys()
                .chain(proposed.keys())
                .find(|key| current.get(*key) != proposed.get(*key))
                .cloned()
        };

        match key {
            None => Ok(()),
            Some(key) => Err(ValidationError::InvalidValue {
                network: network.to_string(),
                key,
                reason: "Only node-specific keys can be changed on a single member".to_string(),
            }
            .into()),
        }
    }

    /// Wait until no other update, rename or delete of this network runs.
    pub async fn lock_mutations(&self) -> MutationGuard<'_> {
        MutationGuard {
            _guard: self.mutation.lock().await,
        }
    }

    /// Apply `put` to this network.
    ///
    /// The new values are visible in memory before anything else happens and
    /// stay in place if a later step fails. For a [`MutationOrigin::Local`]
    /// call the update is then forwarded to the other members (unless it
    /// targets a single node, `target_node`) and written to the store. A peer
    /// notification stops after the in-memory step.
    pub async fn update(
        &self,
        put: NetworkPut,
        target_node: Option<&str>,
        origin: MutationOrigin,
    ) -> Result<()> {
        let guard = self.lock_mutations().await;
        self.update_locked(&guard, put, target_node, origin).await
    }

    /// [`NetworkCommon::update`] for a caller already holding the mutation
    /// lock.
    ///
    /// A targeted update only writes this member's node-specific values and
    /// fails if it changes anything shared.
    pub async fn update_locked(
        &self,
        _guard: &MutationGuard<'_>,
        put: NetworkPut,
        target_node: Option<&str>,
        origin: MutationOrigin,
    ) -> Result<()> {
        let name = self.live_name()?;
        if target_node.is_some() {
            self.check_member_change(&name, &put)?;
        }

        {
            let mut state = self.state.write();
            state.description = put.description.clone();
            state.config = put.config.clone();
        }

        let log = self.log();
        if origin.is_peer_notification() {
            log.debug("Applied update from cluster peer");
            return Ok(());
        }

        let keys = &self.ctx.node_specific_keys;
        let shared = NetworkPut::new(
            put.description.clone(),
            strip_node_specific(&put.config, keys),
        );

        if target_node.is_none() {
            let request = PeerRequest::UpdateNetwork {
                name: name.clone(),
                put: shared.clone(),
            };

            self.ctx
                .notifier
                .notify(&request)
                .await
                .map_err(|source| NetworkError::Propagation {
                    network: name.clone(),
                    source,
                })?;
            log.debug("Notified cluster members of update");
        }

        let change = NetworkChange {
            shared: target_node.is_none().then_some(shared),
            node_config: node_specific_only(&put.config, keys),
        };
        self.ctx
            .store
            .update_network(&name, &self.ctx.node_name, &change)
            .await
            .map_err(|source| NetworkError::Persistence {
                operation: "update",
                network: name.clone(),
                source,
            })?;

        log.info("Updated");
        Ok(())
    }

    /// Rename the network and its resource directory. The store record is
    /// renamed too, unless this is a peer notification.
    pub async fn rename(&self, new_name: &str, origin: MutationOrigin) -> Result<()> {
        let _guard = self.mutation.lock().await;
        let old_name = self.live_name()?;

        let old_dir = self.ctx.paths.network_dir(&old_name);
        let new_dir = self.ctx.paths.network_dir(new_name);

        if new_dir.exists() {
            fs::remove_dir_all(&new_dir)
                .await
                .map_err(|err| NetworkError::io(&new_dir, err))?;
        }

        let moved = old_dir.exists();
        if moved {
            fs::rename(&old_dir, &new_dir)
                .await
                .map_err(|err| NetworkError::io(&old_dir, err))?;
        }

        let stored = if origin.is_peer_notification() {
            Ok(())
        } else {
            self.ctx.store.rename_network(&old_name, new_name).await
        };

        if let Err(source) = stored {
            if moved {
                if let Err(err) = fs::rename(&new_dir, &old_dir).await {
                    self.log().warn(format_args!(
                        "Failed to move {} back to {}: {}",
                        new_dir.display(),
                        old_dir.display(),
                        err
                    ));
                }
            }

            return Err(NetworkError::Persistence {
                operation: "rename",
                network: old_name,
                source,
            });
        }

        let record = self.record();
        self.init(
            record.id,
            new_name.to_string(),
            record.driver,
            record.description,
            record.config,
            record.status,
        );

        self.log().info(format_args!("Renamed from {}", old_name));
        Ok(())
    }

    /// Delete the store record, unless this is a peer notification (the
    /// originating node removes it).
    pub async fn delete(&self, origin: MutationOrigin) -> Result<()> {
        let _guard = self.mutation.lock().await;
        let name = self.live_name()?;

        if !origin.is_peer_notification() {
            self.ctx
                .store
                .delete_network(&name)
                .await
                .map_err(|source| NetworkError::Persistence {
                    operation: "delete",
                    network: name.clone(),
                    source,
                })?;
        }

        self.state.write().deleted = true;
        self.log().info("Deleted");
        Ok(())
    }

    /// Cluster heartbeat hook. Nothing to do for the base entity.
    pub fn handle_heartbeat(&self, _heartbeat: &ClusterHeartbeat) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for NetworkCommon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkCommon")
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}
