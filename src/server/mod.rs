//! Server Module
//!
//! Binds the listener, bootstraps the leader link on a follower, runs the
//! accept loop and owns the node's background tasks.
//!
//! # Startup Sequence
//! 1. Bind the listen address (fatal on failure)
//! 2. Leader: start the replication fan-out worker
//! 3. Follower: dial the leader (fatal once every attempt failed)
//! 4. Start the periodic snapshot task when persistence is enabled
//! 5. Accept connections until shutdown
//! 6. On shutdown: stop every loop and write a final snapshot

mod connection;
mod handlers;
pub(crate) mod peer;

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cache::Cache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::replication::{self, FollowerRegistry, ReplicationManager};
use crate::tasks::spawn_snapshot_task;

pub use connection::{handle_connection, ConnectionContext, LinkRole};
pub use handlers::CommandHandler;
pub use peer::{Peer, PeerId};

// == Server ==
/// A bound cache node, leader or follower depending on its config.
pub struct Server {
    config: Config,
    cache: Cache,
    listener: TcpListener,
}

impl Server {
    // == Bind ==
    /// Binds the configured listen address.
    pub async fn bind(config: Config, cache: Cache) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|source| CacheError::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;
        Ok(Self {
            config,
            cache,
            listener,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    // == Run ==
    /// Serves until `shutdown` resolves.
    ///
    /// Returns an error when the node cannot start or loses its leader for
    /// good; both are fatal for the process.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            cache,
            listener,
        } = self;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let policy = config.retry_policy();

        let (replication, fanout) = if config.is_leader() {
            let (manager, worker) = ReplicationManager::spawn(
                FollowerRegistry::new(),
                policy,
                config.replication_queue,
            );
            (Some(manager), Some(worker))
        } else {
            (None, None)
        };
        let ctx = ConnectionContext::new(cache.clone(), replication, &config, shutdown_rx);

        let upstream = match &config.leader_addr {
            Some(leader) => {
                let stream = replication::connect_to_leader(leader, &policy).await?;
                Some(tokio::spawn(replication::run_upstream(
                    leader.clone(),
                    stream,
                    policy,
                    ctx.clone(),
                )))
            }
            None => None,
        };

        let snapshots = config
            .storage_path
            .clone()
            .map(|path| spawn_snapshot_task(cache.clone(), path, config.save_interval));

        info!(
            addr = %listener.local_addr()?,
            leader = config.is_leader(),
            "cache node listening"
        );

        tokio::pin!(shutdown);
        let upstream_done = wait_for_upstream(upstream);
        tokio::pin!(upstream_done);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break Ok(());
                }
                res = &mut upstream_done => {
                    break res;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, LinkRole::Client, ctx).await {
                                warn!(%addr, error = %err, "connection ended with error");
                            }
                        });
                    }
                    Err(err) => warn!(error = %err, "accept failed"),
                },
            }
        };

        let _ = shutdown_tx.send(true);
        if let Some(task) = snapshots {
            task.abort();
        }
        if let Some(task) = fanout {
            task.abort();
        }
        if let Some(path) = &config.storage_path {
            match cache.save_to_disk(path).await {
                Ok(saved) => info!(path = %path.display(), saved, "final snapshot written"),
                Err(err) => error!(path = %path.display(), error = %err, "final snapshot failed"),
            }
        }
        info!("cache node stopped");
        result
    }
}

/// Resolves with the upstream supervisor's result, or never on a leader.
async fn wait_for_upstream(task: Option<JoinHandle<Result<()>>>) -> Result<()> {
    match task {
        Some(task) => match task.await {
            Ok(result) => result,
            Err(err) => Err(CacheError::Connection(io::Error::other(err))),
        },
        None => std::future::pending().await,
    }
}
