//! Error types for daemon lifecycle operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while managing the daemon process.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The daemon executable is missing or not runnable.
    #[error("daemon executable not found: {path}")]
    ExecutableNotFound {
        /// The path that was checked.
        path: PathBuf,
    },

    /// Spawning the daemon process failed.
    #[error("failed to spawn daemon: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// Delivering a signal to the daemon failed.
    #[error("failed to signal daemon: {0}")]
    SignalFailed(#[source] nix::Error),

    /// Waiting on the daemon process failed.
    #[error("failed to wait for daemon: {0}")]
    WaitFailed(#[source] std::io::Error),
}
