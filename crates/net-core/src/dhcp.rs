//! DHCP range parsing
//!
//! Ranges are configured as a comma separated list of `start-end` address
//! pairs, e.g. `10.0.0.10-10.0.0.20, 10.0.0.50-10.0.0.60`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inclusive range of addresses handed out by DHCP. Both endpoints belong to
/// the same address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DhcpRange<A> {
    pub start: A,
    pub end: A,
}

impl<A: Ord> DhcpRange<A> {
    pub fn new(start: A, end: A) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, addr: &A) -> bool {
        *addr >= self.start && *addr <= self.end
    }

    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }
}

impl<A: std::fmt::Display> std::fmt::Display for DhcpRange<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// What to do with an entry that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangePolicy {
    /// Drop the whole entry and keep going.
    #[default]
    SkipInvalid,
    /// Stop at the first bad entry and report it.
    FailInvalid,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DhcpRangeError {
    #[error("range {entry:?} is not of the form start-end")]
    MissingSeparator { entry: String },

    #[error("range {entry:?} has invalid address {address:?}")]
    InvalidAddress { entry: String, address: String },

    #[error("range {entry:?} address {address:?} is not an {family} address")]
    WrongFamily {
        entry: String,
        address: String,
        family: &'static str,
    },
}

/// Address family a range is coerced to.
pub trait AddressFamily: Sized + Copy + Ord {
    const FAMILY: &'static str;

    fn coerce(addr: IpAddr) -> Option<Self>;
}

impl AddressFamily for Ipv4Addr {
    const FAMILY: &'static str = "IPv4";

    fn coerce(addr: IpAddr) -> Option<Self> {
        match addr {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(v6) => v6.to_ipv4_mapped(),
        }
    }
}

impl AddressFamily for Ipv6Addr {
    const FAMILY: &'static str = "IPv6";

    fn coerce(addr: IpAddr) -> Option<Self> {
        match addr {
            IpAddr::V4(v4) => Some(v4.to_ipv6_mapped()),
            IpAddr::V6(v6) => Some(v6),
        }
    }
}

/// Parse a range list, coercing every endpoint to the family `A`.
///
/// An entry with a bad endpoint is treated as a whole: with
/// [`RangePolicy::SkipInvalid`] it is dropped, never emitted with a
/// placeholder endpoint.
pub fn parse_dhcp_ranges<A: AddressFamily>(
    input: &str,
    policy: RangePolicy,
) -> Result<Vec<DhcpRange<A>>, DhcpRangeError> {
    let mut ranges = Vec::new();
    if input.trim().is_empty() {
        return Ok(ranges);
    }

    for entry in input.split(',') {
        match parse_entry::<A>(entry) {
            Ok(range) => ranges.push(range),
            Err(err) => match policy {
                RangePolicy::SkipInvalid => {
                    log::debug!("Skipping DHCP range: {}", err);
                }
                RangePolicy::FailInvalid => return Err(err),
            },
        }
    }

    Ok(ranges)
}

fn parse_entry<A: AddressFamily>(entry: &str) -> Result<DhcpRange<A>, DhcpRangeError> {
    let trimmed = entry.trim();
    let (start, end) = trimmed
        .split_once('-')
        .ok_or_else(|| DhcpRangeError::MissingSeparator {
            entry: trimmed.to_string(),
        })?;

    Ok(DhcpRange {
        start: parse_endpoint(trimmed, start)?,
        end: parse_endpoint(trimmed, end)?,
    })
}

fn parse_endpoint<A: AddressFamily>(entry: &str, literal: &str) -> Result<A, DhcpRangeError> {
    let literal = literal.trim();
    let addr: IpAddr = literal
        .parse()
        .map_err(|_| DhcpRangeError::InvalidAddress {
            entry: entry.to_string(),
            address: literal.to_string(),
        })?;

    A::coerce(addr).ok_or_else(|| DhcpRangeError::WrongFamily {
        entry: entry.to_string(),
        address: literal.to_string(),
        family: A::FAMILY,
    })
}

/// Best-effort IPv4 range parsing. Malformed entries are skipped.
pub fn dhcp_ranges_v4(input: &str) -> Vec<DhcpRange<Ipv4Addr>> {
    parse_dhcp_ranges(input, RangePolicy::SkipInvalid).unwrap_or_default()
}

/// Best-effort IPv6 range parsing. IPv4 endpoints become IPv4-mapped IPv6
/// addresses; malformed entries are skipped.
pub fn dhcp_ranges_v6(input: &str) -> Vec<DhcpRange<Ipv6Addr>> {
    parse_dhcp_ranges(input, RangePolicy::SkipInvalid).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_ranges_in_input_order() {
        let ranges = dhcp_ranges_v4("10.0.0.10-10.0.0.20, 10.0.0.50-10.0.0.60");
        assert_eq!(
            ranges,
            vec![
                DhcpRange::new(Ipv4Addr::new(10, 0, 0, 10), Ipv4Addr::new(10, 0, 0, 20)),
                DhcpRange::new(Ipv4Addr::new(10, 0, 0, 50), Ipv4Addr::new(10, 0, 0, 60)),
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(dhcp_ranges_v4("").is_empty());
        assert!(dhcp_ranges_v6("   ").is_empty());
    }

    #[test]
    fn test_endpoint_whitespace() {
        let ranges = dhcp_ranges_v4("10.0.0.10 - 10.0.0.20");
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].end, Ipv4Addr::new(10, 0, 0, 20));
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let ranges = dhcp_ranges_v4(
            "10.0.0.10-10.0.0.20,garbage,10.0.0.1,10.0.0.1-10.0.0.2-10.0.0.3,10.0.0.30-bogus,10.0.0.40-10.0.0.41",
        );
        assert_eq!(
            ranges,
            vec![
                DhcpRange::new(Ipv4Addr::new(10, 0, 0, 10), Ipv4Addr::new(10, 0, 0, 20)),
                DhcpRange::new(Ipv4Addr::new(10, 0, 0, 40), Ipv4Addr::new(10, 0, 0, 41)),
            ]
        );
    }

    #[test]
    fn test_v4_accepts_mapped_v6() {
        let ranges = dhcp_ranges_v4("::ffff:10.0.0.10-::ffff:10.0.0.20");
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].start, Ipv4Addr::new(10, 0, 0, 10));

        assert!(dhcp_ranges_v4("fd00::10-fd00::20").is_empty());
    }

    #[test]
    fn test_v6_ranges() {
        let ranges = dhcp_ranges_v6("fd00::10-fd00::20,10.0.0.1-10.0.0.2");
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].start, "fd00::10".parse::<Ipv6Addr>().unwrap());
        assert_eq!(ranges[1].start, Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped());
    }

    #[test]
    fn test_fail_invalid_policy() {
        let err = parse_dhcp_ranges::<Ipv4Addr>("10.0.0.1-10.0.0.5,10.0.0.9", RangePolicy::FailInvalid)
            .unwrap_err();
        assert_eq!(
            err,
            DhcpRangeError::MissingSeparator {
                entry: "10.0.0.9".to_string()
            }
        );

        let err = parse_dhcp_ranges::<Ipv4Addr>("fd00::1-fd00::2", RangePolicy::FailInvalid)
            .unwrap_err();
        assert!(matches!(err, DhcpRangeError::WrongFamily { family: "IPv4", .. }));
    }

    #[test]
    fn test_range_contains() {
        let range = DhcpRange::new(Ipv4Addr::new(10, 0, 0, 10), Ipv4Addr::new(10, 0, 0, 20));
        assert!(range.contains(&Ipv4Addr::new(10, 0, 0, 15)));
        assert!(!range.contains(&Ipv4Addr::new(10, 0, 0, 21)));
        assert!(range.is_ordered());
        assert_eq!(range.to_string(), "10.0.0.10-10.0.0.20");
    }
}
