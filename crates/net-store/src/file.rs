//! JSON file backed network store
//!
//! Layout under the base directory:
//!
//! ```text
//! networks/<name>.json     one record per network, with per-member values
//! instances/*.json         InstanceRef entries used for usage checks
//! profiles/*.json          ProfileRef entries used for usage checks
//! .locks/networks.lock     writer lock
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use netd_network_core::usage::{InstanceSource, ProfileSource};
use netd_network_core::{ConfigMap, NetworkChange, NetworkRecord, NetworkStore};
use netd_shared_types::{InstanceRef, ProfileRef};

use crate::lock::{StoreLock, LOCK_TIMEOUT};
use crate::record::StoredNetwork;

const NETWORKS_LOCK: &str = "networks";

/// Network store keeping one JSON file per network.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
    node_name: String,
    lock_wait: Duration,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>, node_name: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            node_name: node_name.into(),
            lock_wait: LOCK_TIMEOUT,
        }
    }

    /// How long writers wait for the store lock.
    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn networks_dir(&self) -> PathBuf {
        self.base_path.join("networks")
    }

    fn record_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            bail!("Invalid network name {:?}", name);
        }
        Ok(self.networks_dir().join(format!("{}.json", name)))
    }

    async fn lock(&self, operation: &str) -> Result<StoreLock> {
        StoreLock::acquire(
            &self.base_path.join(".locks"),
            NETWORKS_LOCK,
            &self.node_name,
            operation,
            self.lock_wait,
        )
        .await
    }

    async fn read_record(&self, name: &str) -> Result<Option<StoredNetwork>> {
        let path = self.record_path(name)?;
        match fs::read_to_string(&path).await {
            Ok(content) => {
                let record = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                Ok(Some(record))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn require_record(&self, name: &str) -> Result<StoredNetwork> {
        match self.read_record(name).await? {
            Some(record) => Ok(record),
            None => bail!("Network {:?} not found", name),
        }
    }

    /// Write through a temporary file so readers never see a partial record.
    async fn write_record(&self, stored: &StoredNetwork) -> Result<()> {
        let path = self.record_path(&stored.record.name)?;
        fs::create_dir_all(self.networks_dir())
            .await
            .context("Failed to create networks directory")?;

        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        Ok(())
    }

    async fn read_all<T: DeserializeOwned>(&self, dir: &Path) -> Result<Vec<T>> {
        let mut items = Vec::new();
        if !dir.exists() {
            return Ok(items);
        }

        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read directory {}", dir.display()))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some("json")
            {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let item = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            items.push(item);
        }

        Ok(items)
    }

    /// Write an instance entry, for tooling and tests.
    pub async fn put_instance(&self, instance: &InstanceRef) -> Result<()> {
        let file = format!("{}_{}.json", instance.project, instance.name);
        self.put_entry(&self.base_path.join("instances"), &file, instance)
            .await
    }

    /// Write a profile entry, for tooling and tests.
    pub async fn put_profile(&self, profile: &ProfileRef) -> Result<()> {
        let file = format!("{}_{}.json", profile.project, profile.name);
        self.put_entry(&self.base_path.join("profiles"), &file, profile)
            .await
    }

    async fn put_entry<T: Serialize>(&self, dir: &Path, file: &str, value: &T) -> Result<()> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let content = serde_json::to_string_pretty(value)?;
        fs::write(dir.join(file), content)
            .await
            .with_context(|| format!("Failed to write {}", file))?;
        Ok(())
    }
}

#[async_trait]
impl NetworkStore for FileStore {
    async fn create_network(&self, record: &NetworkRecord, node_config: &ConfigMap) -> Result<i64> {
        let _lock = self.lock("create").await?;

        let existing: Vec<StoredNetwork> = self.read_all(&self.networks_dir()).await?;
        if existing.iter().any(|other| other.record.name == record.name) {
            bail!("Network {:?} already exists", record.name);
        }

        let id = existing
            .iter()
            .map(|other| other.record.id)
            .max()
            .unwrap_or(0)
            + 1;
        let mut record = record.clone();
        record.id = id;
        self.write_record(&StoredNetwork::new(record, node_config.clone()))
            .await?;

        log::debug!("Stored network with id {}", id);
        Ok(id)
    }

    async fn get_network(&self, name: &str, node: &str) -> Result<Option<NetworkRecord>> {
        Ok(self.read_record(name).await?.map(|stored| stored.view(node)))
    }

    async fn list_networks(&self, node: &str) -> Result<Vec<NetworkRecord>> {
        let stored: Vec<StoredNetwork> = self.read_all(&self.networks_dir()).await?;
        let mut records: Vec<NetworkRecord> =
            stored.iter().map(|stored| stored.view(node)).collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn update_network(&self, name: &str, node: &str, change: &NetworkChange) -> Result<()> {
        let _lock = self.lock("update").await?;

        let mut stored = self.require_record(name).await?;
        stored.apply(node, change);
        self.write_record(&stored).await
    }

    async fn delete_network(&self, name: &str) -> Result<()> {
        let _lock = self.lock("delete").await?;

        let path = self.record_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                bail!("Network {:?} not found", name)
            }
            Err(err) => Err(err).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    async fn rename_network(&self, old_name: &str, new_name: &str) -> Result<()> {
        let _lock = self.lock("rename").await?;

        if self.read_record(new_name).await?.is_some() {
            bail!("Network {:?} already exists", new_name);
        }

        let mut stored = self.require_record(old_name).await?;
        stored.record.name = new_name.to_string();
        self.write_record(&stored).await?;

        let old_path = self.record_path(old_name)?;
        fs::remove_file(&old_path)
            .await
            .with_context(|| format!("Failed to remove {}", old_path.display()))?;

        Ok(())
    }
}

#[async_trait]
impl InstanceSource for FileStore {
    async fn load_all_instances(&self) -> Result<Vec<InstanceRef>> {
        self.read_all(&self.base_path.join("instances")).await
    }
}

#[async_trait]
impl ProfileSource for FileStore {
    async fn load_all_profiles(&self) -> Result<Vec<ProfileRef>> {
        self.read_all(&self.base_path.join("profiles")).await
    }
}
