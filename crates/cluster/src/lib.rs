//! Cluster peer notification
//!
//! Fans a [`PeerRequest`] out to every other registered cluster member and
//! reports the first failure back to the node that received the original
//! request.

pub mod peer;
pub mod policy;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use thiserror::Error;
use tokio::sync::RwLock;

use netd_network_core::ClusterNotifier;
use netd_shared_types::{ClusterHeartbeat, PeerRequest};

pub use peer::{LocalPeer, PeerEndpoint, PeerHandler};
pub use policy::NotifyPolicy;

/// Result alias for notifier operations
pub type NotifierResult<T> = Result<T, NotifierError>;

/// Sends peer requests to the other members of the cluster.
#[derive(Clone)]
pub struct PeerNotifier {
    local_node: String,
    policy: NotifyPolicy,
    peers: Arc<RwLock<BTreeMap<String, Arc<dyn PeerEndpoint>>>>,
}

impl PeerNotifier {
    /// Create a notifier for `local_node` without any registered peers.
    pub fn new(local_node: impl Into<String>, policy: NotifyPolicy) -> Self {
        Self {
            local_node: local_node.into(),
            policy,
            peers: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn local_node(&self) -> &str {
        &self.local_node
    }

    pub fn policy(&self) -> NotifyPolicy {
        self.policy
    }

    /// Register a member. Names must be unique, and the local node is never a
    /// peer of itself.
    pub async fn register_peer(&self, peer: Arc<dyn PeerEndpoint>) -> NotifierResult<()> {
        let name = peer.name().to_string();
        if name == self.local_node {
            return Err(NotifierError::LocalNode(name));
        }

        let mut guard = self.peers.write().await;
        if guard.contains_key(&name) {
            return Err(NotifierError::PeerExists(name));
        }

        guard.insert(name, peer);
        Ok(())
    }

    pub async fn unregister_peer(&self, name: &str) -> NotifierResult<()> {
        let mut guard = self.peers.write().await;
        guard
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| NotifierError::PeerNotFound(name.to_string()))
    }

    /// Names of the registered peers, in order.
    pub async fn peers(&self) -> Vec<String> {
        self.peers.read().await.keys().cloned().collect()
    }

    /// Update member liveness from a heartbeat.
    pub async fn apply_heartbeat(&self, heartbeat: &ClusterHeartbeat) {
        let guard = self.peers.read().await;
        for member in &heartbeat.members {
            if let Some(peer) = guard.get(&member.name) {
                if peer.is_online() != member.online {
                    debug!("Member {} is now {}", member.name, online_word(member.online));
                }
                peer.set_online(member.online);
            }
        }
    }

    /// Deliver `request` according to the policy.
    pub async fn broadcast(&self, request: &PeerRequest) -> NotifierResult<()> {
        let peers: Vec<Arc<dyn PeerEndpoint>> = {
            let guard = self.peers.read().await;
            guard.values().cloned().collect()
        };

        let targets: Vec<Arc<dyn PeerEndpoint>> = match self.policy {
            NotifyPolicy::All => {
                if let Some(peer) = peers.iter().find(|peer| !peer.is_online()) {
                    return Err(NotifierError::PeerOffline(peer.name().to_string()));
                }
                peers
            }
            NotifyPolicy::Alive => peers.into_iter().filter(|peer| peer.is_online()).collect(),
            NotifyPolicy::TryAll => peers,
        };

        debug!(
            "Notifying {} member(s) about network {}",
            targets.len(),
            request.network()
        );

        let results = join_all(targets.iter().map(|peer| peer.deliver(request))).await;

        let mut first_failure = None;
        for (peer, result) in targets.iter().zip(results) {
            if let Err(source) = result {
                warn!("Notifying member {} failed: {}", peer.name(), source);
                if first_failure.is_none() {
                    first_failure = Some(NotifierError::PeerFailed {
                        peer: peer.name().to_string(),
                        source,
                    });
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn online_word(online: bool) -> &'static str {
    if online {
        "online"
    } else {
        "offline"
    }
}

#[async_trait]
impl ClusterNotifier for PeerNotifier {
    async fn notify(&self, request: &PeerRequest) -> anyhow::Result<()> {
        self.broadcast(request).await.map_err(anyhow::Error::from)
    }
}

impl std::fmt::Debug for PeerNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerNotifier")
            .field("local_node", &self.local_node)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Error type returned by notifier operations.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("member '{0}' already registered")]
    PeerExists(String),
    #[error("member '{0}' not found")]
    PeerNotFound(String),
    #[error("member '{0}' is the local node")]
    LocalNode(String),
    #[error("member '{0}' is offline")]
    PeerOffline(String),
    #[error("member '{peer}' failed: {source}")]
    PeerFailed {
        peer: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid notify policy '{0}'")]
    InvalidPolicy(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use netd_shared_types::ClusterMember;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        requests: Mutex<Vec<PeerRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl PeerHandler for RecordingHandler {
        async fn handle_peer_request(&self, request: &PeerRequest) -> anyhow::Result<()> {
            self.requests.lock().push(request.clone());
            if self.fail {
                anyhow::bail!("rejected");
            }
            Ok(())
        }
    }

    fn delete(name: &str) -> PeerRequest {
        PeerRequest::DeleteNetwork {
            name: name.to_string(),
        }
    }

    async fn cluster(
        policy: NotifyPolicy,
        handlers: &[(&str, Arc<RecordingHandler>)],
    ) -> (PeerNotifier, Vec<Arc<LocalPeer>>) {
        let notifier = PeerNotifier::new("node1", policy);
        let mut peers = Vec::new();
        for (name, handler) in handlers {
            let peer = Arc::new(LocalPeer::new(*name, handler.clone()));
            notifier.register_peer(peer.clone()).await.unwrap();
            peers.push(peer);
        }
        (notifier, peers)
    }

    #[tokio::test]
    async fn test_registration() {
        let notifier = PeerNotifier::new("node1", NotifyPolicy::All);
        let handler = Arc::new(RecordingHandler::default());

        notifier
            .register_peer(Arc::new(LocalPeer::new("node2", handler.clone())))
            .await
            .unwrap();
        assert!(matches!(
            notifier
                .register_peer(Arc::new(LocalPeer::new("node2", handler.clone())))
                .await,
            Err(NotifierError::PeerExists(_))
        ));
        assert!(matches!(
            notifier
                .register_peer(Arc::new(LocalPeer::new("node1", handler)))
                .await,
            Err(NotifierError::LocalNode(_))
        ));

        assert_eq!(notifier.peers().await, vec!["node2"]);
        notifier.unregister_peer("node2").await.unwrap();
        assert!(notifier.unregister_peer("node2").await.is_err());
    }

    #[tokio::test]
    async fn test_every_peer_receives_request_once() {
        let h2 = Arc::new(RecordingHandler::default());
        let h3 = Arc::new(RecordingHandler::default());
        let (notifier, peers) =
            cluster(NotifyPolicy::All, &[("node2", h2.clone()), ("node3", h3.clone())]).await;

        notifier.notify(&delete("lxdbr0")).await.unwrap();

        assert_eq!(*h2.requests.lock(), vec![delete("lxdbr0")]);
        assert_eq!(*h3.requests.lock(), vec![delete("lxdbr0")]);
        assert!(peers.iter().all(|peer| peer.delivered() == 1));
    }

    #[tokio::test]
    async fn test_first_failure_in_member_order() {
        let h2 = Arc::new(RecordingHandler {
            requests: Mutex::new(Vec::new()),
            fail: true,
        });
        let h3 = Arc::new(RecordingHandler {
            requests: Mutex::new(Vec::new()),
            fail: true,
        });
        let h4 = Arc::new(RecordingHandler::default());
        let (notifier, _peers) = cluster(
            NotifyPolicy::All,
            &[("node3", h3.clone()), ("node2", h2.clone()), ("node4", h4.clone())],
        )
        .await;

        match notifier.broadcast(&delete("lxdbr0")).await {
            Err(NotifierError::PeerFailed { peer, .. }) => assert_eq!(peer, "node2"),
            other => panic!("unexpected result: {:?}", other),
        }
        // Delivery is attempted everywhere.
        assert_eq!(h3.requests.lock().len(), 1);
        assert_eq!(h4.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_member_handling_per_policy() {
        let h2 = Arc::new(RecordingHandler::default());
        let h3 = Arc::new(RecordingHandler::default());
        let handlers = [("node2", h2.clone()), ("node3", h3.clone())];

        let (all, peers) = cluster(NotifyPolicy::All, &handlers).await;
        peers[1].set_online(false);
        assert!(matches!(
            all.broadcast(&delete("lxdbr0")).await,
            Err(NotifierError::PeerOffline(name)) if name == "node3"
        ));
        assert!(h2.requests.lock().is_empty());

        let (alive, peers) = cluster(NotifyPolicy::Alive, &handlers).await;
        peers[1].set_online(false);
        alive.broadcast(&delete("lxdbr0")).await.unwrap();
        assert_eq!(h2.requests.lock().len(), 1);
        assert!(h3.requests.lock().is_empty());

        let (try_all, peers) = cluster(NotifyPolicy::TryAll, &handlers).await;
        peers[1].set_online(false);
        assert!(matches!(
            try_all.broadcast(&delete("lxdbr0")).await,
            Err(NotifierError::PeerFailed { peer, .. }) if peer == "node3"
        ));
        assert_eq!(h2.requests.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_heartbeat_updates_liveness() {
        let h2 = Arc::new(RecordingHandler::default());
        let (notifier, peers) = cluster(NotifyPolicy::Alive, &[("node2", h2.clone())]).await;

        notifier
            .apply_heartbeat(&ClusterHeartbeat {
                members: vec![ClusterMember {
                    name: "node2".to_string(),
                    address: "10.0.0.2:8443".to_string(),
                    online: false,
                }],
                time: 1,
            })
            .await;
        assert!(!peers[0].is_online());

        notifier.broadcast(&delete("lxdbr0")).await.unwrap();
        assert!(h2.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_no_peers_is_success() {
        let notifier = PeerNotifier::new("node1", NotifyPolicy::All);
        notifier.notify(&delete("lxdbr0")).await.unwrap();
    }
}
