use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Device config: key/value pairs such as `type=nic`, `network=lxdbr0`.
pub type Device = BTreeMap<String, String>;

/// Devices keyed by device name.
pub type DeviceMap = BTreeMap<String, Device>;

/// An instance as seen by network usage checks. `devices` holds the
/// expanded device set (profile devices included).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceRef {
    pub project: String,
    pub name: String,
    #[serde(default)]
    pub devices: DeviceMap,
}

impl InstanceRef {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            devices: DeviceMap::new(),
        }
    }

    pub fn with_device(mut self, name: impl Into<String>, device: Device) -> Self {
        self.devices.insert(name.into(), device);
        self
    }
}

/// A profile as seen by network usage checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileRef {
    pub project: String,
    pub name: String,
    #[serde(default)]
    pub devices: DeviceMap,
}

impl ProfileRef {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            devices: DeviceMap::new(),
        }
    }

    pub fn with_device(mut self, name: impl Into<String>, device: Device) -> Self {
        self.devices.insert(name.into(), device);
        self
    }
}
