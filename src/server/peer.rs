//! Peer Module
//!
//! The write side of one connection, shared between its receive loop (for
//! replies) and the replication fan-out (for replicated commands).

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};

use crate::protocol::write_frame;

/// Identifier assigned to each connection on this node.
pub type PeerId = u64;

/// Type-erased write half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

// == Peer ==
/// Serialized writer plus a close signal for one connection.
pub struct Peer {
    id: PeerId,
    addr: SocketAddr,
    writer: Mutex<BoxedWriter>,
    write_timeout: Option<Duration>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl Peer {
    pub fn new(
        id: PeerId,
        addr: SocketAddr,
        writer: BoxedWriter,
        write_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            addr,
            writer: Mutex::new(writer),
            write_timeout,
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // == Send ==
    /// Writes one complete frame. Concurrent senders never interleave.
    pub async fn send(&self, frame: &[u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "peer closed"));
        }
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, frame, self.write_timeout).await
    }

    // == Close ==
    /// Marks the peer closed, wakes its receive loop and shuts the write half.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.close_signal.notify_one();
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.close_signal.notified().await;
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
