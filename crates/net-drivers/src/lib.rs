//! netd Network Drivers
//!
//! Bridge and macvlan network drivers, the factory mapping driver kinds to
//! them, and the per-node registry of loaded networks.

pub mod bridge;
pub mod factory;
pub mod macvlan;
pub mod registry;


pub use bridge::{BridgeNetwork, BRIDGE_DRIVER};
pub use factory::{DriverConstructor, DriverFactory};
pub use macvlan::{MacvlanNetwork, MACVLAN_DRIVER};
pub use registry::NetworkRegistry;
