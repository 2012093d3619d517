//! Daemon process lifecycle.
//!
//! This module owns exactly one background `easytier-core` process per
//! [`DaemonManager`] instance:
//!
//! - **args**: builder for the daemon's startup command line
//! - **handle**: liveness checks and signal delivery for the spawned child
//! - **manager**: idempotent start, graceful-then-forced stop, and
//!   best-effort teardown on drop
//!
//! Stop and teardown never raise. Start failures (missing executable, spawn
//! errors) are the only errors that propagate to the caller.

mod args;
mod error;
mod handle;
mod manager;

pub use args::CoreArgs;
pub use error::DaemonError;
pub use handle::DaemonHandle;
pub use manager::{DaemonManager, ReadyCheck, DEFAULT_STOP_TIMEOUT};
#[cfg(unix)]
pub use manager::process_alive;
