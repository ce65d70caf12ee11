//! Bridge network driver
//!
//! A bridge owned by the daemon, with optional IPv4/IPv6 addressing and DHCP.
//! Starting it renders the interface stanza and the DHCP range list into the
//! network's resource directory.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ipnet::{Ipv4Net, Ipv6Net};
use tokio::fs;

use netd_network_core::dhcp::{parse_dhcp_ranges, AddressFamily};
use netd_network_core::rules::{
    is_any, is_bool, is_dhcp_ranges_v4, is_dhcp_ranges_v6, is_interface_list,
    is_network_address_cidr_v4, is_network_address_cidr_v6, is_network_mtu, is_one_of, optional,
};
use netd_network_core::{
    ConfigDiff, ConfigMap, DaemonContext, DhcpRange, Network, NetworkCommon, NetworkCreate,
    NetworkError, NetworkRecord, NetworkStatus, RangePolicy, Result, ValidationError,
    ValidationRules,
};

pub const BRIDGE_DRIVER: &str = "bridge";

/// File holding the interface stanza.
pub const INTERFACES_FILE: &str = "interfaces";

/// File holding one `dhcp-range=<start>,<end>` line per range.
pub const DHCP_RANGES_FILE: &str = "dhcp-ranges";

/// Bridge network implementation
pub struct BridgeNetwork {
    common: NetworkCommon,
}

impl BridgeNetwork {
    pub fn new(ctx: Arc<DaemonContext>, record: NetworkRecord) -> Self {
        Self {
            common: NetworkCommon::new(ctx, record),
        }
    }

    fn ipv4_subnet(config: &ConfigMap) -> Option<Ipv4Net> {
        config.get("ipv4.address").and_then(|addr| addr.parse().ok())
    }

    fn ipv6_subnet(config: &ConfigMap) -> Option<Ipv6Net> {
        config.get("ipv6.address").and_then(|addr| addr.parse().ok())
    }

    fn check_ranges_in_subnet<A>(
        &self,
        config: &ConfigMap,
        key: &str,
        subnet_key: &str,
        contains: impl Fn(&A) -> Option<bool>,
    ) -> Result<()>
    where
        A: AddressFamily + std::fmt::Display,
    {
        let Some(value) = config.get(key).filter(|value| !value.is_empty()) else {
            return Ok(());
        };

        let ranges = parse_dhcp_ranges::<A>(value, RangePolicy::FailInvalid)
            .map_err(ValidationError::from)?;

        for range in &ranges {
            match (contains(&range.start), contains(&range.end)) {
                (Some(true), Some(true)) => {}
                (None, _) | (_, None) => {
                    return Err(self.driver_error(format!("{} requires {}", key, subnet_key)));
                }
                _ => {
                    return Err(self.driver_error(format!(
                        "DHCP range {} is outside of {}",
                        range, subnet_key
                    )));
                }
            }
        }

        Ok(())
    }

    fn driver_error(&self, reason: String) -> NetworkError {
        ValidationError::Driver {
            network: self.common.name(),
            reason,
        }
        .into()
    }

    /// Configured IPv4 ranges, or the whole subnet minus the bridge address
    /// and the broadcast address when none are set.
    fn effective_ipv4_ranges(&self, subnet: Ipv4Net) -> Vec<DhcpRange<Ipv4Addr>> {
        let configured = self.common.dhcpv4_ranges();
        if !configured.is_empty() {
            return configured;
        }

        let start = u32::from(subnet.addr()).saturating_add(1);
        let end = u32::from(subnet.broadcast()).saturating_sub(1);
        if start > end {
            return Vec::new();
        }

        vec![DhcpRange::new(Ipv4Addr::from(start), Ipv4Addr::from(end))]
    }

    fn render_interfaces(&self, config: &ConfigMap) -> String {
        let name = self.common.name();
        let ports = config
            .get("bridge.external_interfaces")
            .filter(|ports| !ports.is_empty())
            .map(|ports| {
                ports
                    .split(',')
                    .map(str::trim)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_else(|| "none".to_string());

        let mut out = String::new();
        out.push_str(&format!("auto {}\n", name));

        match Self::ipv4_subnet(config) {
            Some(subnet) => {
                out.push_str(&format!("iface {} inet static\n", name));
                out.push_str(&format!("    address {}\n", subnet));
            }
            None => out.push_str(&format!("iface {} inet manual\n", name)),
        }
        out.push_str(&format!("    bridge_ports {}\n", ports));
        out.push_str("    bridge_stp off\n");
        out.push_str("    bridge_fd 0\n");
        if let Some(mtu) = config.get("bridge.mtu").filter(|mtu| !mtu.is_empty()) {
            out.push_str(&format!("    mtu {}\n", mtu));
        }

        if let Some(subnet) = Self::ipv6_subnet(config) {
            out.push_str(&format!("\niface {} inet6 static\n", name));
            out.push_str(&format!("    address {}\n", subnet));
        }

        out
    }

    fn render_dhcp_ranges(&self, config: &ConfigMap) -> String {
        let mut out = String::new();

        if self.common.has_dhcpv4() {
            if let Some(subnet) = Self::ipv4_subnet(config) {
                for range in self.effective_ipv4_ranges(subnet) {
                    out.push_str(&format!("dhcp-range={},{}\n", range.start, range.end));
                }
            }
        }

        if self.common.has_dhcpv6() && Self::ipv6_subnet(config).is_some() {
            let ranges: Vec<DhcpRange<Ipv6Addr>> = self.common.dhcpv6_ranges();
            // No ranges: router advertisements only.
            if ranges.is_empty() {
                out.push_str(&format!(
                    "dhcp-range=::,constructor:{},ra-stateless\n",
                    self.common.name()
                ));
            }
            for range in ranges {
                out.push_str(&format!("dhcp-range={},{}\n", range.start, range.end));
            }
        }

        out
    }

    async fn write_resources(&self, dir: &Path) -> Result<()> {
        let config = self.common.config();

        fs::create_dir_all(dir)
            .await
            .map_err(|err| NetworkError::io(dir, err))?;

        let interfaces = dir.join(INTERFACES_FILE);
        fs::write(&interfaces, self.render_interfaces(&config))
            .await
            .map_err(|err| NetworkError::io(&interfaces, err))?;

        let ranges = dir.join(DHCP_RANGES_FILE);
        fs::write(&ranges, self.render_dhcp_ranges(&config))
            .await
            .map_err(|err| NetworkError::io(&ranges, err))?;

        Ok(())
    }
}

#[async_trait]
impl Network for BridgeNetwork {
    fn common(&self) -> &NetworkCommon {
        &self.common
    }

    fn validation_rules(&self) -> ValidationRules {
        ValidationRules::new()
            .with("bridge.mtu", optional(is_network_mtu))
            .with("bridge.external_interfaces", optional(is_interface_list))
            .with("ipv4.address", optional(is_network_address_cidr_v4))
            .with("ipv4.dhcp", optional(is_bool))
            .with("ipv4.dhcp.ranges", optional(is_dhcp_ranges_v4))
            .with("ipv6.address", optional(is_network_address_cidr_v6))
            .with("ipv6.dhcp", optional(is_bool))
            .with("ipv6.dhcp.ranges", optional(is_dhcp_ranges_v6))
            .with("dns.domain", is_any)
            .with("dns.mode", optional(is_one_of(&["managed", "dynamic", "none"])))
    }

    fn validate_driver(&self, config: &ConfigMap) -> Result<()> {
        let v4 = Self::ipv4_subnet(config);
        self.check_ranges_in_subnet::<Ipv4Addr>(
            config,
            "ipv4.dhcp.ranges",
            "ipv4.address",
            |addr| v4.map(|net| net.contains(addr)),
        )?;

        let v6 = Self::ipv6_subnet(config);
        self.check_ranges_in_subnet::<Ipv6Addr>(
            config,
            "ipv6.dhcp.ranges",
            "ipv6.address",
            |addr| v6.map(|net| net.contains(addr)),
        )
    }

    fn fill_config(&self, req: &mut NetworkCreate) -> Result<()> {
        for family in ["ipv4", "ipv6"] {
            let has_address = req
                .config
                .get(&format!("{}.address", family))
                .is_some_and(|addr| !addr.is_empty());

            if has_address {
                req.config
                    .entry(format!("{}.dhcp", family))
                    .or_insert_with(|| "true".to_string());
            }
        }

        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let log = self.common.log();
        let dir = self.common.context().paths.network_dir(&self.common.name());

        if let Err(err) = self.write_resources(&dir).await {
            self.common.set_status(NetworkStatus::Errored);
            return Err(err);
        }

        self.common.set_status(NetworkStatus::Created);
        log.info(format_args!("Started, resources in {}", dir.display()));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let dir = self.common.context().paths.network_dir(&self.common.name());

        for file in [INTERFACES_FILE, DHCP_RANGES_FILE] {
            let path = dir.join(file);
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(NetworkError::io(&path, err)),
            }
        }

        self.common.log().info("Stopped");
        Ok(())
    }

    async fn apply_changes(&self, diff: &ConfigDiff) -> Result<()> {
        if diff.changed_keys.is_empty() {
            return Ok(());
        }

        let dir = self.common.context().paths.network_dir(&self.common.name());
        if !dir.join(INTERFACES_FILE).exists() {
            return Ok(());
        }

        self.common
            .log()
            .debug(format_args!("Re-rendering for {}", diff.changed_keys.join(", ")));
        self.write_resources(&dir).await
    }
}
