//! Reply encoding for command results.

use bytes::{BufMut, Bytes, BytesMut};

use crate::cache::CacheMetrics;

/// Prefix carried by every failed reply.
pub const ERROR_PREFIX: &str = "ERROR: ";

// == Reply ==
/// The single response written for each command frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Successful mutation
    Ok,
    /// Raw value of a GET
    Value(Bytes),
    /// Result of a HAS
    Bool(bool),
    /// Comma-joined result of a KEYS
    Keys(Vec<Bytes>),
    /// JSON body of a METRICS
    Metrics(CacheMetrics),
    /// Any failure, rendered as `ERROR: <message>`
    Error(String),
}

impl Reply {
    /// Builds an error reply from anything displayable.
    pub fn error(err: impl std::fmt::Display) -> Self {
        Reply::Error(err.to_string())
    }

    // == To Frame ==
    /// Encodes the reply as a newline-terminated frame.
    pub fn to_frame(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Reply::Ok => buf.put_slice(b"OK"),
            Reply::Value(value) => buf.put_slice(value),
            Reply::Bool(flag) => buf.put_slice(if *flag { b"true" } else { b"false" }),
            Reply::Keys(keys) => {
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        buf.put_u8(b',');
                    }
                    buf.put_slice(key);
                }
            }
            Reply::Metrics(metrics) => match serde_json::to_vec(metrics) {
                Ok(json) => buf.put_slice(&json),
                Err(err) => {
                    buf.put_slice(ERROR_PREFIX.as_bytes());
                    buf.put_slice(err.to_string().as_bytes());
                }
            },
            Reply::Error(message) => {
                buf.put_slice(ERROR_PREFIX.as_bytes());
                buf.put_slice(message.as_bytes());
            }
        }
        buf.put_u8(b'\n');
        buf.freeze()
    }
}
