//! Networks loaded on this node
//!
//! The registry owns one driver instance per network, routes API calls to
//! them and applies requests forwarded by other cluster members.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::RwLock;

use netd_cluster::PeerHandler;
use netd_network_core::rules::is_interface_name;
use netd_network_core::{
    merge_node_specific, node_specific_only, strip_node_specific, ClusterHeartbeat,
    DaemonContext, MutationOrigin, Network, NetworkCreate, NetworkError, NetworkPut,
    NetworkRecord, PeerRequest, Result, ValidationError,
};

use crate::factory::DriverFactory;

fn validate_network_name(name: &str) -> Result<()> {
    is_interface_name(name).map_err(|violation| {
        ValidationError::InvalidValue {
            network: name.to_string(),
            key: "name".to_string(),
            reason: violation.to_string(),
        }
        .into()
    })
}

/// Networks of this node, by name.
pub struct NetworkRegistry {
    ctx: Arc<DaemonContext>,
    factory: Arc<DriverFactory>,
    networks: RwLock<BTreeMap<String, Arc<dyn Network>>>,
}

impl NetworkRegistry {
    pub fn new(ctx: Arc<DaemonContext>, factory: Arc<DriverFactory>) -> Self {
        Self {
            ctx,
            factory,
            networks: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn context(&self) -> &Arc<DaemonContext> {
        &self.ctx
    }

    /// Rebuild the in-memory networks from this member's view of the store.
    /// Returns how many were loaded.
    pub async fn load(&self) -> Result<usize> {
        let records = self
            .ctx
            .store
            .list_networks(&self.ctx.node_name)
            .await
            .map_err(|source| NetworkError::Persistence {
                operation: "list",
                network: String::new(),
                source,
            })?;

        let mut loaded = BTreeMap::new();
        for record in records {
            let name = record.name.clone();
            let network = self.factory.create(self.ctx.clone(), record)?;
            loaded.insert(name, network);
        }

        let count = loaded.len();
        *self.networks.write().await = loaded;
        info!("Loaded {} network(s) on {}", count, self.ctx.node_name);
        Ok(count)
    }

    /// Start every loaded network. A network that fails to start is left in
    /// the errored state and does not stop the others.
    pub async fn start_all(&self) {
        for network in self.list().await {
            if let Err(err) = network.start().await {
                network
                    .common()
                    .log()
                    .error(format_args!("Failed to start: {}", err));
            }
        }
    }

    pub async fn get(&self, name: &str) -> Result<Arc<dyn Network>> {
        self.networks
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| NetworkError::NotFound {
                network: name.to_string(),
            })
    }

    /// All networks, ordered by name.
    pub async fn list(&self) -> Vec<Arc<dyn Network>> {
        self.networks.read().await.values().cloned().collect()
    }

    /// Create, persist and start a network on this node.
    pub async fn create(&self, mut req: NetworkCreate) -> Result<Arc<dyn Network>> {
        validate_network_name(&req.name)?;
        if self.networks.read().await.contains_key(&req.name) {
            return Err(NetworkError::AlreadyExists { network: req.name });
        }

        let draft = self
            .factory
            .create(self.ctx.clone(), NetworkRecord::from_create(0, req.clone()))?;
        draft.fill_config(&mut req)?;
        draft.validate(&req.config)?;

        let name = req.name.clone();
        let keys = &self.ctx.node_specific_keys;
        let mut shared = NetworkRecord::from_create(0, req.clone());
        shared.config = strip_node_specific(&req.config, keys);
        let id = self
            .ctx
            .store
            .create_network(&shared, &node_specific_only(&req.config, keys))
            .await
            .map_err(|source| NetworkError::Persistence {
                operation: "create",
                network: name.clone(),
                source,
            })?;

        let network = self
            .factory
            .create(self.ctx.clone(), NetworkRecord::from_create(id, req))?;

        if let Err(err) = network.start().await {
            if let Err(cleanup) = network.delete(MutationOrigin::Local).await {
                warn!("Failed to remove network {} after failed start: {}", name, cleanup);
            }
            return Err(err);
        }

        self.networks.write().await.insert(name, network.clone());
        network.common().log().info("Created");
        Ok(network)
    }

    /// Update a network cluster wide, or on `target_node` only.
    pub async fn update(
        &self,
        name: &str,
        put: NetworkPut,
        target_node: Option<&str>,
    ) -> Result<()> {
        let network = self.get(name).await?;
        network.update(put, target_node, MutationOrigin::Local).await
    }

    /// Rename a network that nothing references, on every member.
    ///
    /// The other members rename first. If the local rename then fails they
    /// already use the new name, and the error says so.
    pub async fn rename(&self, name: &str, new_name: &str) -> Result<()> {
        validate_network_name(new_name)?;
        let network = self.get(name).await?;

        if self.networks.read().await.contains_key(new_name) {
            return Err(NetworkError::AlreadyExists {
                network: new_name.to_string(),
            });
        }

        if network.is_used().await? {
            return Err(NetworkError::InUse {
                network: name.to_string(),
            });
        }

        let request = PeerRequest::RenameNetwork {
            name: name.to_string(),
            new_name: new_name.to_string(),
        };
        self.ctx
            .notifier
            .notify(&request)
            .await
            .map_err(|source| NetworkError::Propagation {
                network: name.to_string(),
                source,
            })?;

        if let Err(err) = network.rename(new_name, MutationOrigin::Local).await {
            error!(
                "Network {} renamed to {} on other members but not on {}: {}",
                name, new_name, self.ctx.node_name, err
            );
            return Err(err);
        }

        self.swap_name(name, new_name, network).await;
        Ok(())
    }

    async fn swap_name(&self, name: &str, new_name: &str, network: Arc<dyn Network>) {
        let mut networks = self.networks.write().await;
        networks.remove(name);
        networks.insert(new_name.to_string(), network);
    }

    /// Delete a network that nothing references, on every member.
    ///
    /// The other members delete first. A local failure after that leaves the
    /// network here only; calling delete again finishes the job, since a
    /// member that no longer has the network accepts the request.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let network = self.get(name).await?;

        if network.is_used().await? {
            return Err(NetworkError::InUse {
                network: name.to_string(),
            });
        }

        let request = PeerRequest::DeleteNetwork {
            name: name.to_string(),
        };
        self.ctx
            .notifier
            .notify(&request)
            .await
            .map_err(|source| NetworkError::Propagation {
                network: name.to_string(),
                source,
            })?;

        let local = match network.stop().await {
            Ok(()) => network.delete(MutationOrigin::Local).await,
            Err(err) => Err(err),
        };
        if let Err(err) = local {
            error!(
                "Network {} deleted on other members but not on {}, retry the delete: {}",
                name, self.ctx.node_name, err
            );
            return Err(err);
        }

        self.networks.write().await.remove(name);
        Ok(())
    }

    pub async fn handle_heartbeat(&self, heartbeat: &ClusterHeartbeat) {
        for network in self.list().await {
            if let Err(err) = network.handle_heartbeat(heartbeat) {
                network
                    .common()
                    .log()
                    .warn(format_args!("Heartbeat handling failed: {}", err));
            }
        }
    }
}

#[async_trait]
impl PeerHandler for NetworkRegistry {
    async fn handle_peer_request(&self, request: &PeerRequest) -> anyhow::Result<()> {
        debug!(
            "Peer request for network {} on {}",
            request.network(),
            self.ctx.node_name
        );

        match request {
            PeerRequest::UpdateNetwork { name, put } => {
                let network = self.get(name).await?;
                let config = merge_node_specific(
                    &network.common().config(),
                    &put.config,
                    &self.ctx.node_specific_keys,
                );

                network
                    .update(
                        NetworkPut::new(put.description.clone(), config),
                        None,
                        MutationOrigin::PeerNotification,
                    )
                    .await?;
            }
            PeerRequest::RenameNetwork { name, new_name } => {
                let network = self.get(name).await?;
                if self.networks.read().await.contains_key(new_name) {
                    return Err(NetworkError::AlreadyExists {
                        network: new_name.clone(),
                    }
                    .into());
                }

                network
                    .rename(new_name, MutationOrigin::PeerNotification)
                    .await?;
                self.swap_name(name, new_name, network).await;
            }
            PeerRequest::DeleteNetwork { name } => {
                let Some(network) = self.networks.read().await.get(name).cloned() else {
                    debug!("Network {} already gone on {}", name, self.ctx.node_name);
                    return Ok(());
                };
                network.stop().await?;
                network.delete(MutationOrigin::PeerNotification).await?;
                self.networks.write().await.remove(name);
            }
        }

        Ok(())
    }
}
