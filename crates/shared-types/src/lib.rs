pub mod cluster;
pub mod error;
pub mod instance;
pub mod network;

pub use cluster::{ClusterHeartbeat, ClusterMember, PeerRequest};
pub use error::SharedTypeError;
pub use instance::{Device, DeviceMap, InstanceRef, ProfileRef};
pub use network::{ConfigMap, NetworkCreate, NetworkPut, NetworkRecord, NetworkStatus};
