//! Replication Module
//!
//! Leader to follower replication. A node started without a leader address
//! is the leader: every connection it accepts is treated as a follower and
//! receives each successful mutation. A node started with a leader address
//! dials it and applies the stream of mutations it receives.
//!
//! There is no acknowledgement, catch-up or conflict resolution; a follower
//! only sees writes made while it is connected.

mod follower;
mod manager;
mod registry;
mod retry;

pub use follower::{connect_to_leader, run_upstream};
pub use manager::{fan_out, ReplicationManager};
pub use registry::FollowerRegistry;
pub use retry::RetryPolicy;
