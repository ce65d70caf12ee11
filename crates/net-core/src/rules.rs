//! Reusable validation rules for network config values

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

use ipnet::{Ipv4Net, Ipv6Net};
use regex::Regex;

use crate::dhcp::{parse_dhcp_ranges, AddressFamily, RangePolicy};
use crate::validate::{RuleResult, RuleViolation};

/// Valid MTU range
pub const MTU_RANGE: std::ops::RangeInclusive<u32> = 68..=65535;

/// Valid VLAN tag range
pub const VLAN_TAG_RANGE: std::ops::RangeInclusive<u32> = 1..=4094;

/// Maximum length of a Linux interface name
pub const INTERFACE_NAME_MAX_LEN: usize = 15;

fn interface_name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.-]*$").unwrap())
}

/// Whether `value` is a truthy config string.
pub fn is_true(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Whether `value` is a falsy config string.
pub fn is_false(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

/// Wrap a rule so that an empty value is accepted.
pub fn optional<F>(rule: F) -> impl Fn(&str) -> RuleResult + Send + Sync + 'static
where
    F: Fn(&str) -> RuleResult + Send + Sync + 'static,
{
    move |value: &str| {
        if value.is_empty() {
            Ok(())
        } else {
            rule(value)
        }
    }
}

/// Accept only one of `allowed`.
pub fn is_one_of(allowed: &'static [&'static str]) -> impl Fn(&str) -> RuleResult + Send + Sync {
    move |value: &str| {
        if allowed.iter().any(|candidate| *candidate == value) {
            Ok(())
        } else {
            Err(RuleViolation::new(format!(
                "Invalid value {:?} (not one of {:?})",
                value, allowed
            )))
        }
    }
}

pub fn is_any(_value: &str) -> RuleResult {
    Ok(())
}

pub fn is_bool(value: &str) -> RuleResult {
    if is_true(value) || is_false(value) {
        Ok(())
    } else {
        Err(RuleViolation::new(format!("Invalid value for a boolean {:?}", value)))
    }
}

pub fn is_network_mtu(value: &str) -> RuleResult {
    let mtu = value
        .parse::<u32>()
        .map_err(|_| RuleViolation::new(format!("Invalid MTU {:?}", value)))?;

    if !MTU_RANGE.contains(&mtu) {
        return Err(RuleViolation::new(format!(
            "Invalid MTU value: {} (must be between {} and {})",
            mtu,
            MTU_RANGE.start(),
            MTU_RANGE.end()
        )));
    }

    Ok(())
}

pub fn is_vlan_id(value: &str) -> RuleResult {
    let tag = value
        .parse::<u32>()
        .map_err(|_| RuleViolation::new(format!("Invalid VLAN tag {:?}", value)))?;

    if !VLAN_TAG_RANGE.contains(&tag) {
        return Err(RuleViolation::new(format!(
            "Invalid VLAN tag: {} (must be between {} and {})",
            tag,
            VLAN_TAG_RANGE.start(),
            VLAN_TAG_RANGE.end()
        )));
    }

    Ok(())
}

pub fn is_interface_name(value: &str) -> RuleResult {
    if value.is_empty() {
        return Err(RuleViolation::new("Interface name is required"));
    }

    if value.len() > INTERFACE_NAME_MAX_LEN {
        return Err(RuleViolation::new(format!(
            "Interface name too long (max {} characters)",
            INTERFACE_NAME_MAX_LEN
        )));
    }

    if !interface_name_regex().is_match(value) {
        return Err(RuleViolation::new(format!(
            "Invalid interface name format {:?}",
            value
        )));
    }

    Ok(())
}

/// Comma separated list of interface names.
pub fn is_interface_list(value: &str) -> RuleResult {
    for name in value.split(',') {
        is_interface_name(name.trim())?;
    }

    Ok(())
}

pub fn is_network_address_cidr_v4(value: &str) -> RuleResult {
    value
        .parse::<Ipv4Net>()
        .map(|_| ())
        .map_err(|_| RuleViolation::new(format!("Not an IPv4 CIDR address {:?}", value)))
}

pub fn is_network_address_cidr_v6(value: &str) -> RuleResult {
    value
        .parse::<Ipv6Net>()
        .map(|_| ())
        .map_err(|_| RuleViolation::new(format!("Not an IPv6 CIDR address {:?}", value)))
}

fn is_dhcp_ranges<A: AddressFamily + std::fmt::Display>(value: &str) -> RuleResult {
    let ranges = parse_dhcp_ranges::<A>(value, RangePolicy::FailInvalid)
        .map_err(|err| RuleViolation::new(err.to_string()))?;

    if let Some(range) = ranges.iter().find(|range| !range.is_ordered()) {
        return Err(RuleViolation::new(format!(
            "Range {} ends before it starts",
            range
        )));
    }

    Ok(())
}

pub fn is_dhcp_ranges_v4(value: &str) -> RuleResult {
    is_dhcp_ranges::<Ipv4Addr>(value)
}

pub fn is_dhcp_ranges_v6(value: &str) -> RuleResult {
    is_dhcp_ranges::<Ipv6Addr>(value)
}
