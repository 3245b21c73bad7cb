//! Connection Handler
//!
//! One receive loop per connection. Frames are executed in arrival order and
//! each reply is written before the next frame is read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::config::Config;
use crate::error::Result;
use crate::protocol::{read_frame_timeout, Reply};
use crate::replication::{FollowerRegistry, ReplicationManager};
use crate::server::{CommandHandler, Peer, PeerId};

/// How a connection is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// Accepted connection: every command gets a reply. On a leader the
    /// connection is also registered as a follower.
    Client,
    /// A follower's link to its leader: commands are applied silently.
    Upstream,
}

// == Connection Context ==
/// Everything a receive loop needs, shared by all connections of a node.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    handler: CommandHandler,
    registry: Option<FollowerRegistry>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    next_peer_id: Arc<AtomicU64>,
    shutdown: watch::Receiver<bool>,
}

impl ConnectionContext {
    pub fn new(
        cache: Cache,
        replication: Option<ReplicationManager>,
        config: &Config,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let registry = replication.as_ref().map(|r| r.registry().clone());
        Self {
            handler: CommandHandler::new(cache, replication),
            registry,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            next_peer_id: Arc::new(AtomicU64::new(1)),
            shutdown,
        }
    }

    pub fn handler(&self) -> &CommandHandler {
        &self.handler
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }

    fn next_peer_id(&self) -> PeerId {
        self.next_peer_id.fetch_add(1, Ordering::Relaxed)
    }
}

// == Handle Connection ==
/// Serves a TCP connection until EOF, an I/O error, shutdown, or until the
/// replication manager closes it.
pub async fn handle_connection(
    stream: TcpStream,
    role: LinkRole,
    ctx: ConnectionContext,
) -> Result<()> {
    let addr = stream.peer_addr()?;
    let (reader, writer) = stream.into_split();
    let peer = Arc::new(Peer::new(
        ctx.next_peer_id(),
        addr,
        Box::new(writer),
        ctx.write_timeout,
    ));
    serve(BufReader::new(reader), peer, role, &ctx).await
}

/// The receive loop proper, over any buffered reader.
pub(crate) async fn serve<R>(
    mut reader: R,
    peer: Arc<Peer>,
    role: LinkRole,
    ctx: &ConnectionContext,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let registry = match role {
        LinkRole::Client => ctx.registry.clone(),
        LinkRole::Upstream => None,
    };
    if let Some(registry) = &registry {
        registry.add(Arc::clone(&peer)).await;
        info!(peer = peer.id(), addr = %peer.addr(), "follower registered");
    } else {
        debug!(peer = peer.id(), addr = %peer.addr(), ?role, "connection opened");
    }

    let mut shutdown = ctx.shutdown.clone();
    let result = if *shutdown.borrow_and_update() {
        Ok(())
    } else {
        receive_loop(&mut reader, &peer, role, ctx, &mut shutdown).await
    };

    if let Some(registry) = &registry {
        if registry.remove(peer.id()).await.is_some() {
            info!(peer = peer.id(), addr = %peer.addr(), "follower removed");
        }
    }
    peer.close().await;
    debug!(peer = peer.id(), "connection closed");
    result
}

async fn receive_loop<R>(
    reader: &mut R,
    peer: &Peer,
    role: LinkRole,
    ctx: &ConnectionContext,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            _ = peer.closed() => return Ok(()),
            frame = read_frame_timeout(reader, ctx.read_timeout) => frame?,
        };
        let Some(frame) = frame else {
            return Ok(());
        };

        let reply = ctx.handler.handle_frame(&frame, Some(peer.id())).await;
        if role == LinkRole::Upstream {
            if let Reply::Error(msg) = &reply {
                warn!(error = %msg, "replicated command rejected");
            }
            continue;
        }
        peer.send(&reply.to_frame()).await?;
    }
}
