//! Client Module
//!
//! Minimal request/reply client for the line protocol, used by the console
//! binary and the integration tests.

use std::io;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{CacheError, Result};
use crate::protocol::{read_frame_timeout, write_frame, Message};

// == Cache Client ==
/// One connection to a cache node.
///
/// Replies follow request order, but a leader registers every accepted
/// connection as a follower. Mutations other clients make on that leader are
/// pushed to this connection as command lines too, so a reply read here can
/// be a replicated `SET`, `DEL` or `BATCH` instead. Use a follower, or a
/// leader with no other writers, when replies must line up with requests.
#[derive(Debug)]
pub struct CacheClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    timeout: Option<Duration>,
}

impl CacheClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            timeout: None,
        })
    }

    /// Bounds every write and every wait for a reply.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    // == Request ==
    /// Sends a raw command line and returns the reply line.
    ///
    /// `ERROR:` replies are returned as text, not as `Err`; errors are
    /// reserved for transport failures.
    /// Non-UTF-8 bytes in the reply are replaced; use [`execute`] for
    /// binary values.
    ///
    /// [`execute`]: CacheClient::execute
    pub async fn request(&mut self, line: &str) -> Result<String> {
        let mut frame = line.trim_end_matches(['\r', '\n']).as_bytes().to_vec();
        frame.push(b'\n');
        let reply = self.round_trip(&frame).await?;
        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    /// Sends an encoded message and returns the raw reply line.
    pub async fn execute(&mut self, message: &Message) -> Result<Bytes> {
        self.round_trip(&message.to_frame()).await
    }

    async fn round_trip(&mut self, frame: &[u8]) -> Result<Bytes> {
        write_frame(&mut self.writer, frame, self.timeout).await?;
        match read_frame_timeout(&mut self.reader, self.timeout).await? {
            Some(reply) => Ok(Bytes::from(reply)),
            None => Err(CacheError::Connection(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ))),
        }
    }
}
