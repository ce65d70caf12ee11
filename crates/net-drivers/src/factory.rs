//! Driver factory
//!
//! Maps a driver kind (the `type` of a network) to the constructor of its
//! [`Network`] implementation.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use netd_network_core::{DaemonContext, Network, NetworkError, NetworkRecord, Result};

use crate::bridge::{BridgeNetwork, BRIDGE_DRIVER};
use crate::macvlan::{MacvlanNetwork, MACVLAN_DRIVER};

/// Network constructor function type
pub type DriverConstructor =
    Box<dyn Fn(Arc<DaemonContext>, NetworkRecord) -> Arc<dyn Network> + Send + Sync>;

/// Factory for creating network driver instances
pub struct DriverFactory {
    constructors: RwLock<HashMap<String, DriverConstructor>>,
}

impl DriverFactory {
    /// Create a factory with the built-in drivers registered
    pub fn new() -> Self {
        let factory = Self::empty();

        factory.register_driver(
            BRIDGE_DRIVER,
            Box::new(|ctx, record| -> Arc<dyn Network> {
                Arc::new(BridgeNetwork::new(ctx, record))
            }),
        );
        factory.register_driver(
            MACVLAN_DRIVER,
            Box::new(|ctx, record| -> Arc<dyn Network> {
                Arc::new(MacvlanNetwork::new(ctx, record))
            }),
        );

        factory
    }

    /// Create a factory without any driver
    pub fn empty() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// Register a driver, replacing any previous one of the same kind
    pub fn register_driver(&self, kind: impl Into<String>, constructor: DriverConstructor) {
        let kind = kind.into();
        debug!("Registered network driver: {}", kind);
        self.constructors.write().insert(kind, constructor);
    }

    /// Construct the driver instance for `record`
    pub fn create(
        &self,
        ctx: Arc<DaemonContext>,
        record: NetworkRecord,
    ) -> Result<Arc<dyn Network>> {
        let constructors = self.constructors.read();
        let constructor = constructors
            .get(&record.driver)
            .ok_or_else(|| NetworkError::UnknownDriver {
                driver: record.driver.clone(),
            })?;

        Ok(constructor(ctx, record))
    }

    pub fn has_driver(&self, kind: &str) -> bool {
        self.constructors.read().contains_key(kind)
    }

    /// Registered driver kinds, sorted
    pub fn drivers(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.constructors.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl Default for DriverFactory {
    fn default() -> Self {
        Self::new()
    }
}
