//! netd Network Core
//!
//! Base network entity shared by all drivers: config validation, DHCP range
//! parsing, usage detection and cluster-aware update, rename and delete.

pub mod cluster;
pub mod common;
pub mod context;
pub mod dhcp;
pub mod driver;
pub mod error;
pub mod logging;
pub mod rules;
pub mod store;
pub mod usage;
pub mod validate;


pub use cluster::{
    default_node_specific_keys, merge_node_specific, node_specific_only, strip_node_specific,
    ClusterNotifier, NODE_SPECIFIC_NETWORK_CONFIG,
};
pub use common::{ConfigDiff, MutationGuard, MutationOrigin, NetworkCommon};
pub use context::{DaemonContext, NetworkPaths, DEFAULT_VAR_DIR};
pub use dhcp::{dhcp_ranges_v4, dhcp_ranges_v6, parse_dhcp_ranges, DhcpRange, RangePolicy};
pub use driver::Network;
pub use error::{NetworkError, ValidationError};
pub use logging::LogContext;
pub use store::{NetworkChange, NetworkStore};
pub use usage::{
    DeviceReferenceCheck, EmptyUsageSource, InstanceSource, NetworkReferenceCheck, ProfileSource,
    UsageScanner,
};
pub use validate::{FieldValidator, RuleResult, RuleViolation, ValidationRules};

pub use netd_shared_types::{
    ClusterHeartbeat, ConfigMap, NetworkCreate, NetworkPut, NetworkRecord, NetworkStatus,
    PeerRequest,
};

/// Result type for network operations
pub type Result<T> = std::result::Result<T, NetworkError>;
