//! Cluster member endpoints

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use netd_shared_types::PeerRequest;

/// Receiving side of a peer notification. Requests handed to it always come
/// from another member and are applied without being forwarded again.
#[async_trait]
pub trait PeerHandler: Send + Sync {
    async fn handle_peer_request(&self, request: &PeerRequest) -> anyhow::Result<()>;
}

/// A cluster member the notifier can reach.
#[async_trait]
pub trait PeerEndpoint: Send + Sync {
    fn name(&self) -> &str;

    fn is_online(&self) -> bool;

    fn set_online(&self, online: bool);

    async fn deliver(&self, request: &PeerRequest) -> anyhow::Result<()>;
}

/// Member running in this process. Requests go through their JSON wire form
/// before reaching the handler.
pub struct LocalPeer {
    name: String,
    online: AtomicBool,
    delivered: AtomicUsize,
    handler: Arc<dyn PeerHandler>,
}

impl LocalPeer {
    pub fn new(name: impl Into<String>, handler: Arc<dyn PeerHandler>) -> Self {
        Self {
            name: name.into(),
            online: AtomicBool::new(true),
            delivered: AtomicUsize::new(0),
            handler,
        }
    }

    /// Number of requests handed to the handler so far.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerEndpoint for LocalPeer {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    async fn deliver(&self, request: &PeerRequest) -> anyhow::Result<()> {
        if !self.is_online() {
            anyhow::bail!("member {} is offline", self.name);
        }

        let wire = serde_json::to_vec(request)?;
        let request: PeerRequest = serde_json::from_slice(&wire)?;

        self.delivered.fetch_add(1, Ordering::SeqCst);
        self.handler.handle_peer_request(&request).await
    }
}

impl std::fmt::Debug for LocalPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPeer")
            .field("name", &self.name)
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}
