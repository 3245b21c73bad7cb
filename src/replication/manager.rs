//! Replication Manager
//!
//! Leader-side fan-out. Mutations are queued in the order the handlers
//! accept them and a single worker writes each one to every follower, so
//! followers observe the leader's mutation order.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::protocol::{Command, Message};
use crate::replication::{FollowerRegistry, RetryPolicy};
use crate::server::PeerId;

/// One queued mutation.
#[derive(Debug)]
struct Outbound {
    command: Command,
    frame: Bytes,
    /// Connection the mutation arrived on; it is not echoed back there
    origin: Option<PeerId>,
}

// == Replication Manager ==
/// Cloneable handle used by command handlers to propagate mutations.
#[derive(Debug, Clone)]
pub struct ReplicationManager {
    registry: FollowerRegistry,
    queue: mpsc::Sender<Outbound>,
}

impl ReplicationManager {
    /// Starts the fan-out worker.
    ///
    /// The worker stops once every handle has been dropped, or when the
    /// returned `JoinHandle` is aborted.
    pub fn spawn(
        registry: FollowerRegistry,
        policy: RetryPolicy,
        queue_capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let worker = tokio::spawn(run_fanout(rx, registry.clone(), policy));
        (
            Self {
                registry,
                queue: tx,
            },
            worker,
        )
    }

    pub fn registry(&self) -> &FollowerRegistry {
        &self.registry
    }

    // == Propagate ==
    /// Queues a mutation for every follower except `origin`.
    ///
    /// Never blocks the caller. A full queue drops the mutation.
    pub fn propagate(&self, message: &Message, origin: Option<PeerId>) {
        let outbound = Outbound {
            command: message.command(),
            frame: message.to_frame(),
            origin,
        };
        if let Err(err) = self.queue.try_send(outbound) {
            let command = match &err {
                mpsc::error::TrySendError::Full(out) | mpsc::error::TrySendError::Closed(out) => {
                    out.command
                }
            };
            warn!(%command, "replication queue unavailable, mutation not propagated: {}", err);
        }
    }
}

async fn run_fanout(
    mut queue: mpsc::Receiver<Outbound>,
    registry: FollowerRegistry,
    policy: RetryPolicy,
) {
    info!("replication fan-out started");
    while let Some(outbound) = queue.recv().await {
        let delivered = fan_out(&registry, &policy, &outbound.frame, outbound.origin).await;
        debug!(command = %outbound.command, delivered, "mutation replicated");
    }
    info!("replication fan-out stopped");
}

// == Fan Out ==
/// Writes `frame` to every registered follower except `origin`.
///
/// A follower that still fails after every retry is closed and removed from
/// the registry. Returns how many followers received the frame.
pub async fn fan_out(
    registry: &FollowerRegistry,
    policy: &RetryPolicy,
    frame: &[u8],
    origin: Option<PeerId>,
) -> usize {
    let mut delivered = 0;
    for peer in registry.snapshot().await {
        if Some(peer.id()) == origin {
            continue;
        }
        match policy.execute(|| peer.send(frame)).await {
            Ok(()) => delivered += 1,
            Err(source) => {
                let err = CacheError::Replication {
                    peer: peer.addr(),
                    source,
                };
                warn!(peer = peer.id(), "{}, dropping follower", err);
                peer.close().await;
                registry.remove(peer.id()).await;
            }
        }
    }
    delivered
}
