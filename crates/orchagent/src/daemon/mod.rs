//! Daemon event loop, Orch coordination and offline replay.

mod orchdaemon;
mod replay;

pub use orchdaemon::{OrchDaemon, OrchDaemonConfig, TableChange};
pub use replay::{read_replay, ReplayError, MAX_REPLAY_ROUNDS};
