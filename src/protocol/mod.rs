//! Wire Protocol Module
//!
//! Textual, whitespace-delimited commands carried one per line.
//!
//! | Command | Wire form |
//! |---|---|
//! | SET | `SET <key> <value> <ttl_ns>` |
//! | GET / HAS / DEL | `<CMD> <key>` |
//! | KEYS / METRICS | `<CMD>` |
//! | BATCH | `BATCH <k1>:<v1>,<k2>:<v2> <ttl_ns>` |
//!
//! The same encoder produces client requests and replication traffic, so a
//! follower applies replicated writes through the exact path clients use.

pub mod codec;
mod message;
mod reply;


pub use codec::{read_frame, read_frame_timeout, write_frame, MAX_FRAME_LEN};
pub use message::{Command, Message};
pub use reply::{Reply, ERROR_PREFIX};
