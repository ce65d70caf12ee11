//! Macvlan network driver

use std::sync::Arc;

use async_trait::async_trait;

use netd_network_core::rules::{is_interface_name, is_network_mtu, is_vlan_id, optional};
use netd_network_core::{
    DaemonContext, Network, NetworkCommon, NetworkRecord, NetworkStatus, Result, ValidationRules,
};

pub const MACVLAN_DRIVER: &str = "macvlan";

/// Macvlan network implementation
///
/// Instances attach to the host `parent` interface, optionally through a
/// VLAN sub-interface. The network itself owns no host resources.
pub struct MacvlanNetwork {
    common: NetworkCommon,
}

impl MacvlanNetwork {
    pub fn new(ctx: Arc<DaemonContext>, record: NetworkRecord) -> Self {
        Self {
            common: NetworkCommon::new(ctx, record),
        }
    }

    /// Host interface instances attach to, e.g. `eth0.100`.
    pub fn host_interface(&self) -> Option<String> {
        let parent = self.common.config_value("parent")?;
        match self.common.config_value("vlan").filter(|vlan| !vlan.is_empty()) {
            Some(vlan) => Some(format!("{}.{}", parent, vlan)),
            None => Some(parent),
        }
    }
}

#[async_trait]
impl Network for MacvlanNetwork {
    fn common(&self) -> &NetworkCommon {
        &self.common
    }

    fn validation_rules(&self) -> ValidationRules {
        ValidationRules::new()
            .with("parent", is_interface_name)
            .with("mtu", optional(is_network_mtu))
            .with("vlan", optional(is_vlan_id))
    }

    async fn start(&self) -> Result<()> {
        self.common.set_status(NetworkStatus::Created);
        self.common.log().info(format_args!(
            "Started on {}",
            self.host_interface().unwrap_or_default()
        ));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.common.log().info("Stopped");
        Ok(())
    }
}
