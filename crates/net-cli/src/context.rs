//! Wiring of the node collaborators used by every command

use std::sync::Arc;

use anyhow::{Context, Result};

use netd_cluster::PeerNotifier;
use netd_network_core::{DaemonContext, NetworkPaths};
use netd_network_drivers::{DriverFactory, NetworkRegistry};
use netd_network_store::FileStore;

use crate::config::DaemonConfig;

pub struct CliContext {
    pub config: DaemonConfig,
    pub store: Arc<FileStore>,
    pub notifier: Arc<PeerNotifier>,
    pub registry: Arc<NetworkRegistry>,
}

impl CliContext {
    /// Build the store, notifier and registry for `config` and load the
    /// persisted networks.
    pub async fn bootstrap(config: DaemonConfig) -> Result<Arc<Self>> {
        let store = Arc::new(FileStore::new(config.store_path(), &config.node_name));
        let notifier = Arc::new(PeerNotifier::new(&config.node_name, config.notify_policy));

        let daemon = DaemonContext::new(
            &config.node_name,
            NetworkPaths::new(config.var_dir.clone()),
            store.clone(),
            notifier.clone(),
        )
        .with_usage_sources(store.clone(), store.clone())
        .with_node_specific_keys(config.node_specific_keys.clone());

        let registry = Arc::new(NetworkRegistry::new(
            Arc::new(daemon),
            Arc::new(DriverFactory::new()),
        ));
        registry
            .load()
            .await
            .with_context(|| format!("Failed to load networks on {}", config.node_name))?;

        log::debug!(
            "Bootstrapped node {} (store {}, policy {})",
            config.node_name,
            store.base_path().display(),
            config.notify_policy
        );

        Ok(Arc::new(Self {
            config,
            store,
            notifier,
            registry,
        }))
    }
}
