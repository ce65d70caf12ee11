//! In-memory network store

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use netd_network_core::{ConfigMap, NetworkChange, NetworkRecord, NetworkStore};

use crate::record::StoredNetwork;

/// Store operation, as recorded in the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Create { name: String, id: i64 },
    Update { name: String, node: String },
    Delete { name: String },
    Rename { from: String, to: String },
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<String, StoredNetwork>,
    next_id: i64,
    journal: Vec<StoreOp>,
    fail_writes: Option<String>,
}

/// Network store held in memory. Used by single-node setups without a state
/// directory and by tests, which can inspect the journal of writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every successful write, oldest first.
    pub fn journal(&self) -> Vec<StoreOp> {
        self.inner.lock().journal.clone()
    }

    /// Make every following write fail with `reason`, or succeed again when
    /// `None`.
    pub fn fail_writes(&self, reason: Option<&str>) {
        self.inner.lock().fail_writes = reason.map(str::to_string);
    }

    fn check_writable(inner: &Inner) -> Result<()> {
        if let Some(reason) = &inner.fail_writes {
            bail!("{}", reason);
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkStore for MemoryStore {
    async fn create_network(&self, record: &NetworkRecord, node_config: &ConfigMap) -> Result<i64> {
        let mut inner = self.inner.lock();
        Self::check_writable(&inner)?;

        if inner.records.contains_key(&record.name) {
            bail!("Network {:?} already exists", record.name);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let mut record = record.clone();
        record.id = id;
        inner.journal.push(StoreOp::Create {
            name: record.name.clone(),
            id,
        });
        inner.records.insert(
            record.name.clone(),
            StoredNetwork::new(record, node_config.clone()),
        );

        Ok(id)
    }

    async fn get_network(&self, name: &str, node: &str) -> Result<Option<NetworkRecord>> {
        Ok(self.inner.lock().records.get(name).map(|stored| stored.view(node)))
    }

    async fn list_networks(&self, node: &str) -> Result<Vec<NetworkRecord>> {
        Ok(self
            .inner
            .lock()
            .records
            .values()
            .map(|stored| stored.view(node))
            .collect())
    }

    async fn update_network(&self, name: &str, node: &str, change: &NetworkChange) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::check_writable(&inner)?;

        let Some(stored) = inner.records.get_mut(name) else {
            bail!("Network {:?} not found", name);
        };
        stored.apply(node, change);
        inner.journal.push(StoreOp::Update {
            name: name.to_string(),
            node: node.to_string(),
        });

        Ok(())
    }

    async fn delete_network(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::check_writable(&inner)?;

        if inner.records.remove(name).is_none() {
            bail!("Network {:?} not found", name);
        }
        inner.journal.push(StoreOp::Delete {
            name: name.to_string(),
        });

        Ok(())
    }

    async fn rename_network(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::check_writable(&inner)?;

        if inner.records.contains_key(new_name) {
            bail!("Network {:?} already exists", new_name);
        }
        let Some(mut stored) = inner.records.remove(old_name) else {
            bail!("Network {:?} not found", old_name);
        };

        stored.record.name = new_name.to_string();
        inner.records.insert(new_name.to_string(), stored);
        inner.journal.push(StoreOp::Rename {
            from: old_name.to_string(),
            to: new_name.to_string(),
        });

        Ok(())
    }
}
