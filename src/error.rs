//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.

use std::io;
use std::net::SocketAddr;
use std::num::ParseIntError;

use thiserror::Error;

use crate::protocol::Command;

// == Protocol Error Enum ==
/// Errors raised while decoding a command frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame contained no tokens at all
    #[error("invalid command")]
    InvalidCommand,

    /// The first token is not a known verb
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Wrong number of arguments, or a malformed BATCH pair
    #[error("invalid {0} command format")]
    InvalidFormat(Command),

    /// The TTL token is not a base-10 integer
    #[error("invalid TTL: {0}")]
    InvalidTtl(#[from] ParseIntError),
}

// == Cache Error Enum ==
/// Unified error type for the cache server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Malformed command
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Key not found in cache
    #[error("key ({0}) not found")]
    NotFound(String),

    /// Key is present but its TTL has elapsed
    #[error("key ({0}) has expired")]
    Expired(String),

    /// Socket I/O failure
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// Writing to a follower failed after every retry
    #[error("replication to {peer} failed: {source}")]
    Replication {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The listen address could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A follower could not reach its leader
    #[error("leader at {addr} unreachable after {attempts} attempts")]
    LeaderUnreachable { addr: String, attempts: u32 },

    /// Snapshot could not be encoded or decoded
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl CacheError {
    /// True for both flavours of a failed lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_) | CacheError::Expired(_))
    }

    /// True for errors that must terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CacheError::Bind { .. } | CacheError::LeaderUnreachable { .. }
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
