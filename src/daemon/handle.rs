//! Handle to a running daemon process.

use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};

use super::error::DaemonError;

/// Interval between liveness polls while waiting for exit.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a spawned daemon process.
///
/// Created by [`DaemonManager::start`](super::DaemonManager::start) and
/// invalidated when stop completes; a restart always produces a fresh
/// handle.
pub struct DaemonHandle {
    pub(crate) child: Child,
    /// PID of the daemon process.
    pub pid: u32,
}

impl DaemonHandle {
    pub(crate) fn new(child: Child) -> Self {
        let pid = child.id();
        Self { child, pid }
    }

    /// Check whether the daemon is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Get the exit status if the daemon has exited, without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, DaemonError> {
        self.child.try_wait().map_err(DaemonError::WaitFailed)
    }

    /// Send SIGTERM for a graceful shutdown.
    pub fn terminate(&self) -> Result<(), DaemonError> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM).map_err(DaemonError::SignalFailed)
    }

    /// Forcibly kill the daemon (SIGKILL).
    pub fn kill(&mut self) -> Result<(), DaemonError> {
        self.child.kill().map_err(DaemonError::SpawnFailed)
    }

    /// Wait up to `timeout` for the daemon to exit.
    ///
    /// Returns `true` if the process is confirmed exited within the window.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return true,
                Ok(None) => {}
                // Can't observe the child any more; report it as not
                // confirmed exited and let the caller escalate.
                Err(_) => return false,
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }
}
