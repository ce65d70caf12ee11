use serde::{Deserialize, Serialize};

use crate::network::NetworkPut;

/// Mutation forwarded from the node that received the original request to
/// every other cluster member. Receivers always apply it as a peer
/// notification and never forward it again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum PeerRequest {
    UpdateNetwork { name: String, put: NetworkPut },
    RenameNetwork { name: String, new_name: String },
    DeleteNetwork { name: String },
}

impl PeerRequest {
    pub fn network(&self) -> &str {
        match self {
            PeerRequest::UpdateNetwork { name, .. } => name,
            PeerRequest::RenameNetwork { name, .. } => name,
            PeerRequest::DeleteNetwork { name } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterMember {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub online: bool,
}

/// Heartbeat payload distributed by the cluster leader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ClusterHeartbeat {
    #[serde(default)]
    pub members: Vec<ClusterMember>,
    #[serde(default)]
    pub time: u64,
}
