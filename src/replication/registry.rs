//! Follower Registry
//!
//! The set of connections a leader replicates to. Every connection accepted
//! by a leader is registered here for as long as it stays open.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::server::{Peer, PeerId};

// == Follower Registry ==
/// Shared, cloneable registry of live follower connections.
#[derive(Debug, Clone, Default)]
pub struct FollowerRegistry {
    followers: Arc<Mutex<HashMap<PeerId, Arc<Peer>>>>,
}

impl FollowerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, peer: Arc<Peer>) {
        self.followers.lock().await.insert(peer.id(), peer);
    }

    /// Removes a follower. Returns it when it was still registered.
    pub async fn remove(&self, id: PeerId) -> Option<Arc<Peer>> {
        self.followers.lock().await.remove(&id)
    }

    /// Copies the current membership so callers can write without the lock.
    pub async fn snapshot(&self) -> Vec<Arc<Peer>> {
        self.followers.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.followers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.followers.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::peer::tests::duplex_peer;

    #[tokio::test]
    async fn test_add_remove() {
        let registry = FollowerRegistry::new();
        let (a, _ra) = duplex_peer(1);
        let (b, _rb) = duplex_peer(2);

        registry.add(a).await;
        registry.add(b).await;
        assert_eq!(registry.len().await, 2);

        assert!(registry.remove(1).await.is_some());
        assert!(registry.remove(1).await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let registry = FollowerRegistry::new();
        let (a, _ra) = duplex_peer(1);
        registry.add(a).await;

        let members = registry.snapshot().await;
        registry.remove(1).await;

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id(), 1);
        assert!(registry.is_empty().await);
    }
}
