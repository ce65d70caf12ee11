//! Tests for the JSON file store

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use netd_network_core::usage::{InstanceSource, ProfileSource};
use netd_network_core::{
    ConfigMap, NetworkChange, NetworkPut, NetworkRecord, NetworkStatus, NetworkStore,
};
use netd_shared_types::{Device, InstanceRef, ProfileRef};

use crate::{FileStore, StoreLock};

fn record(name: &str, driver: &str) -> NetworkRecord {
    let mut config = ConfigMap::new();
    config.insert("ipv4.address".to_string(), "10.0.0.1/24".to_string());

    NetworkRecord {
        id: 0,
        name: name.to_string(),
        driver: driver.to_string(),
        description: String::new(),
        config,
        status: NetworkStatus::Created,
    }
}

async fn create(store: &FileStore, name: &str, driver: &str) -> anyhow::Result<i64> {
    store
        .create_network(&record(name, driver), &ConfigMap::new())
        .await
}

/// Records get increasing ids and round trip through disk
#[tokio::test]
async fn test_create_and_get() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path(), "node1");

    assert_eq!(create(&store, "lxdbr0", "bridge").await.unwrap(), 1);
    assert_eq!(create(&store, "macvlan0", "macvlan").await.unwrap(), 2);

    let stored = store.get_network("lxdbr0", "node1").await.unwrap().unwrap();
    assert_eq!(stored.id, 1);
    assert_eq!(stored.driver, "bridge");
    assert_eq!(stored.config.get("ipv4.address").unwrap(), "10.0.0.1/24");
    assert!(temp_dir.path().join("networks/lxdbr0.json").exists());

    assert!(store.get_network("missing", "node1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_name_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path(), "node1");

    create(&store, "lxdbr0", "bridge").await.unwrap();
    let err = store
        .create_network(&record("lxdbr0", "macvlan"), &ConfigMap::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn test_invalid_names_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path(), "node1");

    assert!(create(&store, "", "bridge").await.is_err());
    assert!(create(&store, "../etc", "bridge").await.is_err());
    assert!(store.get_network(".locks", "node1").await.is_err());
}

#[tokio::test]
async fn test_update_list_and_delete() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path(), "node1");
    create(&store, "lxdbr1", "bridge").await.unwrap();
    create(&store, "lxdbr0", "bridge").await.unwrap();

    let mut config = ConfigMap::new();
    config.insert("ipv4.dhcp".to_string(), "false".to_string());
    store
        .update_network(
            "lxdbr0",
            "node1",
            &NetworkChange {
                shared: Some(NetworkPut::new("primary", config.clone())),
                node_config: ConfigMap::new(),
            },
        )
        .await
        .unwrap();

    let stored = store.get_network("lxdbr0", "node1").await.unwrap().unwrap();
    assert_eq!(stored.description, "primary");
    assert_eq!(stored.config, config);
    assert_eq!(stored.id, 2);

    let names: Vec<String> = store
        .list_networks("node1")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["lxdbr0", "lxdbr1"]);

    store.delete_network("lxdbr0").await.unwrap();
    assert!(store.get_network("lxdbr0", "node1").await.unwrap().is_none());
    assert!(store.delete_network("lxdbr0").await.is_err());
    assert!(store
        .update_network("lxdbr0", "node1", &NetworkChange::default())
        .await
        .is_err());
}

#[tokio::test]
async fn test_rename() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path(), "node1");
    create(&store, "lxdbr0", "bridge").await.unwrap();
    create(&store, "lxdbr1", "bridge").await.unwrap();

    assert!(store.rename_network("lxdbr0", "lxdbr1").await.is_err());
    assert!(store.rename_network("missing", "lxdbr9").await.is_err());

    store.rename_network("lxdbr0", "lxdbr2").await.unwrap();
    assert!(store.get_network("lxdbr0", "node1").await.unwrap().is_none());

    let renamed = store.get_network("lxdbr2", "node1").await.unwrap().unwrap();
    assert_eq!(renamed.name, "lxdbr2");
    assert_eq!(renamed.id, 1);
}

/// Member values are written next to the shared config and read back per
/// member by a fresh store
#[tokio::test]
async fn test_member_values_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path(), "node1");

    let mut defaults = ConfigMap::new();
    defaults.insert("parent".to_string(), "eth0".to_string());
    store
        .create_network(&record("mv0", "macvlan"), &defaults)
        .await
        .unwrap();

    let mut own = ConfigMap::new();
    own.insert("parent".to_string(), "eth7".to_string());
    store
        .update_network(
            "mv0",
            "node2",
            &NetworkChange {
                shared: None,
                node_config: own,
            },
        )
        .await
        .unwrap();

    let mut shared = record("mv0", "macvlan").config;
    shared.insert("mtu".to_string(), "9000".to_string());
    store
        .update_network(
            "mv0",
            "node1",
            &NetworkChange {
                shared: Some(NetworkPut::new("uplink", shared)),
                node_config: defaults.clone(),
            },
        )
        .await
        .unwrap();

    let reopened = FileStore::new(temp_dir.path(), "node2");
    let on_node2 = reopened.get_network("mv0", "node2").await.unwrap().unwrap();
    assert_eq!(on_node2.description, "uplink");
    assert_eq!(on_node2.config.get("mtu").unwrap(), "9000");
    assert_eq!(on_node2.config.get("parent").unwrap(), "eth7");

    let listed = reopened.list_networks("node3").await.unwrap();
    assert_eq!(listed[0].config.get("parent").unwrap(), "eth0");
}

/// Concurrent creates never hand out the same id
#[tokio::test]
async fn test_concurrent_creates() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(temp_dir.path(), "node1"));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .create_network(&record(&format!("net{}", i), "bridge"), &ConfigMap::new())
                .await
                .unwrap()
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.sort();
    assert_eq!(ids, (1..=8).collect::<Vec<i64>>());
    assert!(!temp_dir.path().join(".locks/networks.lock").exists());
}

/// Writers give up once the lock wait elapses
#[tokio::test]
async fn test_writer_waits_for_lock() {
    let temp_dir = TempDir::new().unwrap();
    let store =
        FileStore::new(temp_dir.path(), "node1").with_lock_wait(Duration::from_millis(200));

    let held = StoreLock::acquire(
        &temp_dir.path().join(".locks"),
        "networks",
        "node2",
        "create",
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    assert!(create(&store, "lxdbr0", "bridge").await.is_err());
    assert!(store.get_network("lxdbr0", "node1").await.unwrap().is_none());

    drop(held);
    assert_eq!(create(&store, "lxdbr0", "bridge").await.unwrap(), 1);
}

#[tokio::test]
async fn test_inventory_sources() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::new(temp_dir.path(), "node1");

    assert!(store.load_all_instances().await.unwrap().is_empty());
    assert!(store.load_all_profiles().await.unwrap().is_empty());

    let mut nic = Device::new();
    nic.insert("type".to_string(), "nic".to_string());
    nic.insert("network".to_string(), "lxdbr0".to_string());

    store
        .put_instance(&InstanceRef::new("default", "c1").with_device("eth0", nic.clone()))
        .await
        .unwrap();
    store
        .put_instance(&InstanceRef::new("web", "c2"))
        .await
        .unwrap();
    store
        .put_profile(&ProfileRef::new("default", "default").with_device("eth0", nic))
        .await
        .unwrap();

    let instances = store.load_all_instances().await.unwrap();
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].name, "c1");
    assert_eq!(store.load_all_profiles().await.unwrap().len(), 1);
}
