//! Command Handlers
//!
//! Maps decoded messages onto cache operations and builds the reply.
//! On a leader, successful mutations are handed to the replication manager
//! after the local apply.

use tracing::debug;

use crate::cache::Cache;
use crate::error::Result;
use crate::protocol::{Message, Reply};
use crate::replication::ReplicationManager;
use crate::server::PeerId;

// == Command Handler ==
/// Executes commands against the local cache.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    cache: Cache,
    /// Present only on a leader
    replication: Option<ReplicationManager>,
}

impl CommandHandler {
    pub fn new(cache: Cache, replication: Option<ReplicationManager>) -> Self {
        Self { cache, replication }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn is_leader(&self) -> bool {
        self.replication.is_some()
    }

    // == Handle Frame ==
    /// Decodes one frame and executes it. Decode failures become error replies.
    pub async fn handle_frame(&self, raw: &[u8], origin: Option<PeerId>) -> Reply {
        match Message::parse(raw) {
            Ok(message) => self.handle(message, origin).await,
            Err(err) => {
                debug!(error = %err, "rejected frame");
                Reply::error(err)
            }
        }
    }

    // == Handle ==
    /// Executes one message. `origin` is the connection it arrived on.
    pub async fn handle(&self, message: Message, origin: Option<PeerId>) -> Reply {
        match self.execute(&message).await {
            Ok(reply) => {
                if message.is_mutating() {
                    if let Some(replication) = &self.replication {
                        replication.propagate(&message, origin);
                    }
                }
                reply
            }
            Err(err) => Reply::error(err),
        }
    }

    async fn execute(&self, message: &Message) -> Result<Reply> {
        let reply = match message {
            Message::Set { key, value, ttl } => {
                self.cache.set(key.clone(), value.clone(), *ttl).await;
                Reply::Ok
            }
            Message::Get { key } => Reply::Value(self.cache.get(key).await?),
            Message::Del { key } => {
                self.cache.delete(key).await;
                Reply::Ok
            }
            Message::Has { key } => Reply::Bool(self.cache.has(key).await),
            Message::Keys => Reply::Keys(self.cache.keys().await),
            Message::Metrics => Reply::Metrics(self.cache.metrics().await),
            Message::Batch { pairs, ttl } => {
                let pairs = pairs.iter().map(|(k, v)| (k.clone(), v.clone()));
                self.cache.batch_set(pairs, *ttl).await;
                Reply::Ok
            }
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

    use crate::cache::CacheMetrics;
    use crate::replication::{FollowerRegistry, RetryPolicy};
    use crate::server::peer::tests::duplex_peer;

    fn follower_handler() -> CommandHandler {
        CommandHandler::new(Cache::new(), None)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let handler = follower_handler();

        assert_eq!(handler.handle_frame(b"SET foo bar 0", None).await, Reply::Ok);
        assert_eq!(
            handler.handle_frame(b"GET foo", None).await,
            Reply::Value(Bytes::from_static(b"bar"))
        );
    }

    #[tokio::test]
    async fn test_missing_key_replies_error() {
        let handler = follower_handler();

        let reply = handler.handle_frame(b"GET nope", None).await;
        assert_eq!(reply, Reply::Error("key (nope) not found".to_string()));
        assert_eq!(handler.handle_frame(b"HAS nope", None).await, Reply::Bool(false));
    }

    #[tokio::test]
    async fn test_malformed_frames() {
        let handler = follower_handler();

        assert_eq!(
            handler.handle_frame(b"SET onlykey", None).await,
            Reply::Error("invalid SET command format".to_string())
        );
        assert_eq!(
            handler.handle_frame(b"", None).await,
            Reply::Error("invalid command".to_string())
        );
        assert_eq!(
            handler.handle_frame(b"FLUSH", None).await,
            Reply::Error("unknown command: FLUSH".to_string())
        );
        match handler.handle_frame(b"SET k v soon", None).await {
            Reply::Error(msg) => assert!(msg.starts_with("invalid TTL: ")),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_keys_and_metrics() {
        let handler = follower_handler();

        assert_eq!(handler.handle_frame(b"BATCH a:1,b:2 0", None).await, Reply::Ok);
        match handler.handle_frame(b"KEYS", None).await {
            Reply::Keys(mut keys) => {
                keys.sort();
                assert_eq!(keys, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        handler.handle_frame(b"GET a", None).await;
        handler.handle_frame(b"GET zzz", None).await;
        handler.handle_frame(b"DEL a", None).await;

        assert_eq!(
            handler.handle_frame(b"METRICS", None).await,
            Reply::Metrics(CacheMetrics {
                hits: 1,
                misses: 1,
                sets: 2,
                deletes: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_non_utf8_value_is_returned_verbatim() {
        let handler = follower_handler();

        assert_eq!(handler.handle_frame(b"SET k \xff\xfe 0", None).await, Reply::Ok);
        assert_eq!(
            handler.handle_frame(b"GET k", None).await,
            Reply::Value(Bytes::from_static(b"\xff\xfe"))
        );
    }

    #[tokio::test]
    async fn test_non_utf8_keys_do_not_collide() {
        let handler = follower_handler();

        assert_eq!(handler.handle_frame(b"SET a\xff one 0", None).await, Reply::Ok);
        assert_eq!(handler.handle_frame(b"SET a\xfe two 0", None).await, Reply::Ok);

        assert_eq!(
            handler.handle_frame(b"GET a\xff", None).await,
            Reply::Value(Bytes::from_static(b"one"))
        );
        assert_eq!(
            handler.handle_frame(b"GET a\xfe", None).await,
            Reply::Value(Bytes::from_static(b"two"))
        );
        assert_eq!(handler.cache().keys().await.len(), 2);

        handler.handle_frame(b"DEL a\xff", None).await;
        assert_eq!(handler.handle_frame(b"HAS a\xff", None).await, Reply::Bool(false));
        assert_eq!(handler.handle_frame(b"HAS a\xfe", None).await, Reply::Bool(true));
    }

    #[tokio::test]
    async fn test_leader_replicates_non_utf8_frames_byte_for_byte() {
        let registry = FollowerRegistry::new();
        let (follower, mut remote) = duplex_peer(4);
        registry.add(follower).await;
        let (manager, _worker) =
            ReplicationManager::spawn(registry, RetryPolicy::new(1, Duration::ZERO), 8);
        let handler = CommandHandler::new(Cache::new(), Some(manager));

        handler.handle_frame(b"SET k\x80 \xff\xfe 0", None).await;

        let expected = b"SET k\x80 \xff\xfe 0\n";
        let mut received = vec![0u8; expected.len()];
        remote.read_exact(&mut received).await.unwrap();
        assert_eq!(&received[..], &expected[..]);
    }

    #[tokio::test]
    async fn test_leader_propagates_only_mutations() {
        let registry = FollowerRegistry::new();
        let (follower, remote) = duplex_peer(9);
        registry.add(follower).await;
        let (manager, _worker) =
            ReplicationManager::spawn(registry, RetryPolicy::new(1, Duration::ZERO), 8);
        let handler = CommandHandler::new(Cache::new(), Some(manager));
        assert!(handler.is_leader());

        handler.handle_frame(b"GET x", None).await;
        handler.handle_frame(b"HAS x", None).await;
        handler.handle_frame(b"set x 1 0", None).await;
        handler.handle_frame(b"SET bad", None).await;
        handler.handle_frame(b"DEL x", None).await;

        let mut lines = BufReader::new(remote).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "SET x 1 0");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "DEL x");
    }
}
