//! Follower Link
//!
//! Follower-side replication: dial the leader, apply what it streams, and
//! re-dial when the link drops.

use tokio::net::TcpStream;
use tracing::{error, info, warn};

use crate::error::{CacheError, Result};
use crate::replication::RetryPolicy;
use crate::server::{handle_connection, ConnectionContext, LinkRole};

// == Connect To Leader ==
/// Dials the leader, retrying per `policy`.
///
/// Exhausting the attempts yields [`CacheError::LeaderUnreachable`], which
/// is fatal for a follower.
pub async fn connect_to_leader(addr: &str, policy: &RetryPolicy) -> Result<TcpStream> {
    match policy.execute(|| TcpStream::connect(addr)).await {
        Ok(stream) => {
            info!(leader = %addr, "connected to leader");
            Ok(stream)
        }
        Err(err) => {
            error!(leader = %addr, error = %err, "giving up on leader");
            Err(CacheError::LeaderUnreachable {
                addr: addr.to_string(),
                attempts: policy.max_attempts,
            })
        }
    }
}

// == Upstream Supervisor ==
/// Serves the leader link until shutdown, reconnecting whenever it drops.
///
/// `stream` is the already established first connection. Returns `Ok` on
/// shutdown and an error once the leader can no longer be reached.
pub async fn run_upstream(
    leader: String,
    mut stream: TcpStream,
    policy: RetryPolicy,
    ctx: ConnectionContext,
) -> Result<()> {
    loop {
        if let Err(err) = handle_connection(stream, LinkRole::Upstream, ctx.clone()).await {
            warn!(leader = %leader, error = %err, "leader link failed");
        }
        if ctx.is_shutting_down() {
            return Ok(());
        }

        warn!(leader = %leader, "lost connection to leader, reconnecting");
        let mut shutdown = ctx.shutdown_receiver();
        stream = tokio::select! {
            res = connect_to_leader(&leader, &policy) => res?,
            _ = shutdown.changed() => return Ok(()),
        };
    }
}
