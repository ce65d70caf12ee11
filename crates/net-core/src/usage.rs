//! Network usage detection
//!
//! A network is in use when any instance in any project, or any profile,
//! has a device referencing it.

use anyhow::Result;
use async_trait::async_trait;

use netd_shared_types::{DeviceMap, InstanceRef, ProfileRef};

use crate::error::NetworkError;

/// Enumerates every instance across all projects.
#[async_trait]
pub trait InstanceSource: Send + Sync {
    async fn load_all_instances(&self) -> Result<Vec<InstanceRef>>;
}

/// Enumerates every profile across all projects.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn load_all_profiles(&self) -> Result<Vec<ProfileRef>>;
}

/// Decides whether an instance or profile references a network by name.
#[async_trait]
pub trait NetworkReferenceCheck: Send + Sync {
    async fn instance_uses_network(&self, instance: &InstanceRef, network: &str) -> Result<bool>;
    async fn profile_uses_network(&self, profile: &ProfileRef, network: &str) -> Result<bool>;
}

/// Reference check based on NIC devices.
///
/// A NIC references a network through its `network` key, or through `parent`
/// when it has no `network` key (NICs attached straight to a host bridge or
/// macvlan parent).
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceReferenceCheck;

impl DeviceReferenceCheck {
    pub fn devices_reference(devices: &DeviceMap, network: &str) -> bool {
        devices.values().any(|device| {
            if device.get("type").map(String::as_str) != Some("nic") {
                return false;
            }

            match device.get("network") {
                Some(name) => name == network,
                None => device.get("parent").map(String::as_str) == Some(network),
            }
        })
    }
}

#[async_trait]
impl NetworkReferenceCheck for DeviceReferenceCheck {
    async fn instance_uses_network(&self, instance: &InstanceRef, network: &str) -> Result<bool> {
        Ok(Self::devices_reference(&instance.devices, network))
    }

    async fn profile_uses_network(&self, profile: &ProfileRef, network: &str) -> Result<bool> {
        Ok(Self::devices_reference(&profile.devices, network))
    }
}

/// Source with no instances and no profiles, for nodes that do not track
/// either.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyUsageSource;

#[async_trait]
impl InstanceSource for EmptyUsageSource {
    async fn load_all_instances(&self) -> Result<Vec<InstanceRef>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl ProfileSource for EmptyUsageSource {
    async fn load_all_profiles(&self) -> Result<Vec<ProfileRef>> {
        Ok(Vec::new())
    }
}

/// Scans instances, then profiles, for references to a network.
pub struct UsageScanner<'a> {
    instances: &'a dyn InstanceSource,
    profiles: &'a dyn ProfileSource,
    references: &'a dyn NetworkReferenceCheck,
}

impl<'a> UsageScanner<'a> {
    pub fn new(
        instances: &'a dyn InstanceSource,
        profiles: &'a dyn ProfileSource,
        references: &'a dyn NetworkReferenceCheck,
    ) -> Self {
        Self {
            instances,
            profiles,
            references,
        }
    }

    /// Whether `network` is referenced. Stops at the first hit; any
    /// enumeration or predicate failure aborts the scan.
    pub async fn is_used(&self, network: &str) -> Result<bool, NetworkError> {
        let query_error = |source: anyhow::Error| NetworkError::UsageQuery {
            network: network.to_string(),
            source,
        };

        let instances = self
            .instances
            .load_all_instances()
            .await
            .map_err(query_error)?;

        for instance in &instances {
            if self
                .references
                .instance_uses_network(instance, network)
                .await
                .map_err(query_error)?
            {
                log::debug!(
                    "Network {} is used by instance {}/{}",
                    network,
                    instance.project,
                    instance.name
                );
                return Ok(true);
            }
        }

        let profiles = self
            .profiles
            .load_all_profiles()
            .await
            .map_err(query_error)?;

        for profile in &profiles {
            if self
                .references
                .profile_uses_network(profile, network)
                .await
                .map_err(query_error)?
            {
                log::debug!(
                    "Network {} is used by profile {}/{}",
                    network,
                    profile.project,
                    profile.name
                );
                return Ok(true);
            }
        }

        Ok(false)
    }
}
