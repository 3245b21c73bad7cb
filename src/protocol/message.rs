//! Command Message Module
//!
//! Parses whitespace-delimited command lines into [`Message`] values and
//! encodes them back into the exact bytes a peer expects to receive.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

// == Command ==
/// The verb at the head of every command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Get,
    Set,
    Del,
    Has,
    Keys,
    Metrics,
    Batch,
}

impl Command {
    /// Wire spelling of the verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Get => "GET",
            Command::Set => "SET",
            Command::Del => "DEL",
            Command::Has => "HAS",
            Command::Keys => "KEYS",
            Command::Metrics => "METRICS",
            Command::Batch => "BATCH",
        }
    }

    /// Whether the command changes cache state and must be replicated.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Command::Set | Command::Del | Command::Batch)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Command::Get),
            "SET" => Ok(Command::Set),
            "DEL" => Ok(Command::Del),
            "HAS" => Ok(Command::Has),
            "KEYS" => Ok(Command::Keys),
            "METRICS" => Ok(Command::Metrics),
            "BATCH" => Ok(Command::Batch),
            _ => Err(ProtocolError::UnknownCommand(s.to_string())),
        }
    }
}

// == Message ==
/// A decoded command with its arguments.
///
/// Keys and values are opaque bytes; only the verb and the TTL are read as
/// text. TTLs are `None` when the entry never expires; on the wire that is `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Get {
        key: Bytes,
    },
    Set {
        key: Bytes,
        value: Bytes,
        ttl: Option<Duration>,
    },
    Del {
        key: Bytes,
    },
    Has {
        key: Bytes,
    },
    Keys,
    Metrics,
    Batch {
        pairs: BTreeMap<Bytes, Bytes>,
        ttl: Option<Duration>,
    },
}

impl Message {
    // == Parse ==
    /// Decodes one command frame.
    ///
    /// Tokens are split on ASCII whitespace, so keys and values can never
    /// contain it. Every other byte is kept as is.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        let parts: Vec<&[u8]> = raw
            .split(u8::is_ascii_whitespace)
            .filter(|token| !token.is_empty())
            .collect();
        let Some((head, args)) = parts.split_first() else {
            return Err(ProtocolError::InvalidCommand);
        };
        let cmd: Command = String::from_utf8_lossy(head).parse()?;

        match (cmd, args) {
            (Command::Set, [key, value, ttl]) => Ok(Message::Set {
                key: Bytes::copy_from_slice(key),
                value: Bytes::copy_from_slice(value),
                ttl: parse_ttl(ttl)?,
            }),
            (Command::Get, [key]) => Ok(Message::Get {
                key: Bytes::copy_from_slice(key),
            }),
            (Command::Del, [key]) => Ok(Message::Del {
                key: Bytes::copy_from_slice(key),
            }),
            (Command::Has, [key]) => Ok(Message::Has {
                key: Bytes::copy_from_slice(key),
            }),
            (Command::Keys, []) => Ok(Message::Keys),
            (Command::Metrics, []) => Ok(Message::Metrics),
            (Command::Batch, [pairs, ttl]) => Ok(Message::Batch {
                pairs: parse_pairs(pairs)?,
                ttl: parse_ttl(ttl)?,
            }),
            (cmd, _) => Err(ProtocolError::InvalidFormat(cmd)),
        }
    }

    /// Returns the verb of this message.
    pub fn command(&self) -> Command {
        match self {
            Message::Get { .. } => Command::Get,
            Message::Set { .. } => Command::Set,
            Message::Del { .. } => Command::Del,
            Message::Has { .. } => Command::Has,
            Message::Keys => Command::Keys,
            Message::Metrics => Command::Metrics,
            Message::Batch { .. } => Command::Batch,
        }
    }

    pub fn is_mutating(&self) -> bool {
        self.command().is_mutating()
    }

    // == Encode ==
    /// Appends the command line, without terminator, to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(self.command().as_str().as_bytes());
        match self {
            Message::Set { key, value, ttl } => {
                put_token(buf, key);
                put_token(buf, value);
                put_token(buf, ttl_nanos(*ttl).to_string().as_bytes());
            }
            Message::Get { key } | Message::Del { key } | Message::Has { key } => {
                put_token(buf, key);
            }
            Message::Keys | Message::Metrics => {}
            Message::Batch { pairs, ttl } => {
                buf.put_u8(b' ');
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        buf.put_u8(b',');
                    }
                    buf.put_slice(key);
                    buf.put_u8(b':');
                    buf.put_slice(value);
                }
                put_token(buf, ttl_nanos(*ttl).to_string().as_bytes());
            }
        }
    }

    // == To Frame ==
    /// Encodes the message as a newline-terminated request frame.
    pub fn to_frame(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.put_u8(b'\n');
        buf.freeze()
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Message::parse(line.as_bytes())
    }
}

/// Human readable form for logs. Non UTF-8 bytes are shown replaced; use
/// [`Message::to_frame`] for the wire.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

// == Helpers ==
fn put_token(buf: &mut BytesMut, token: &[u8]) {
    buf.put_u8(b' ');
    buf.put_slice(token);
}

/// Zero and negative TTLs both mean "never expires".
fn parse_ttl(token: &[u8]) -> Result<Option<Duration>, ProtocolError> {
    let nanos: i64 = String::from_utf8_lossy(token).parse()?;
    Ok((nanos > 0).then(|| Duration::from_nanos(nanos as u64)))
}

fn ttl_nanos(ttl: Option<Duration>) -> u128 {
    ttl.map_or(0, |d| d.as_nanos())
}

/// Pairs split on `,`, key and value on the first `:`.
fn parse_pairs(token: &[u8]) -> Result<BTreeMap<Bytes, Bytes>, ProtocolError> {
    token
        .split(|b| *b == b',')
        .map(|pair| -> Result<(Bytes, Bytes), ProtocolError> {
            let colon = pair
                .iter()
                .position(|b| *b == b':')
                .ok_or(ProtocolError::InvalidFormat(Command::Batch))?;
            Ok((
                Bytes::copy_from_slice(&pair[..colon]),
                Bytes::copy_from_slice(&pair[colon + 1..]),
            ))
        })
        .collect()
}
