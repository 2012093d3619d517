//! Daemon process manager: idempotent start, escalating stop, teardown.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::error::DaemonError;
use super::handle::DaemonHandle;

/// Default bound on the graceful-stop wait.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period after SIGKILL before declaring the process unkillable.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Fallback settle delay when readiness probing is disabled.
const DEFAULT_STARTUP_DELAY: Duration = Duration::from_millis(500);

/// Interval between readiness-probe attempts.
const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// How the manager decides the daemon's control socket is ready.
///
/// The daemon offers no readiness handshake. A bounded probe of the control
/// CLI is the reliable option; the fixed delay matches the original tool's
/// behavior and remains available for setups without a control binary.
pub enum ReadyCheck {
    /// Sleep for a fixed duration after spawning.
    Delay(Duration),
    /// Poll the control CLI until it answers, up to a deadline.
    Probe {
        /// Path to the control executable.
        cli_path: PathBuf,
        /// Give up probing (with a warning) after this long.
        timeout: Duration,
    },
}

impl Default for ReadyCheck {
    fn default() -> Self {
        ReadyCheck::Delay(DEFAULT_STARTUP_DELAY)
    }
}

/// Owns the lifecycle of one background daemon process.
///
/// `start` is idempotent while the process lives; `stop` escalates from
/// SIGTERM to SIGKILL and never raises; dropping the manager stops the
/// daemon if it is still running.
pub struct DaemonManager {
    core_path: PathBuf,
    ready: ReadyCheck,
    handle: Option<DaemonHandle>,
}

impl DaemonManager {
    /// Create a manager for the daemon at `core_path`.
    pub fn new(core_path: impl Into<PathBuf>) -> Self {
        Self {
            core_path: core_path.into(),
            ready: ReadyCheck::default(),
            handle: None,
        }
    }

    /// Replace the default post-start settle delay with `check`.
    pub fn with_ready_check(mut self, check: ReadyCheck) -> Self {
        self.ready = check;
        self
    }

    /// PID of the managed daemon, if one was started.
    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().map(|h| h.pid)
    }

    /// Check whether the managed daemon is currently running.
    pub fn is_running(&mut self) -> bool {
        self.handle.as_mut().is_some_and(|h| h.is_running())
    }

    /// Start the daemon with the given arguments.
    ///
    /// If a previously started daemon is still alive, returns its PID
    /// without spawning a duplicate. The child is detached into its own
    /// session with stdout/stderr discarded, and `start` does not return
    /// until the control socket is considered ready per the configured
    /// [`ReadyCheck`].
    pub fn start(&mut self, args: &[String]) -> Result<u32, DaemonError> {
        if let Some(handle) = self.handle.as_mut() {
            if handle.is_running() {
                info!(pid = handle.pid, "daemon already running, reusing");
                return Ok(handle.pid);
            }
        }

        debug!(core = %self.core_path.display(), ?args, "spawning daemon");
        let mut cmd = Command::new(&self.core_path);
        cmd.args(args).stdout(Stdio::null()).stderr(Stdio::null());

        // New session so the daemon survives signals delivered to our
        // process group (Ctrl-C in the controlling terminal).
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            unsafe {
                cmd.pre_exec(|| {
                    nix::unistd::setsid().map(|_| ()).map_err(std::io::Error::from)
                });
            }
        }

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DaemonError::ExecutableNotFound {
                    path: self.core_path.clone(),
                }
            } else {
                DaemonError::SpawnFailed(e)
            }
        })?;

        let handle = DaemonHandle::new(child);
        let pid = handle.pid;
        info!(pid, "daemon started");
        self.handle = Some(handle);

        self.await_ready();
        Ok(pid)
    }

    /// Stop the daemon, waiting up to `timeout` for a graceful exit before
    /// escalating to SIGKILL.
    ///
    /// Returns `true` if the process is confirmed not running by the end of
    /// the sequence (including the cases "never started" and "already
    /// exited"), `false` if it is still alive. Never raises; failures along
    /// the way are logged and the escalation continues.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            debug!("no daemon was started, nothing to stop");
            return true;
        };

        if handle.is_running() {
            info!(pid = handle.pid, "terminating daemon");
            if let Err(e) = handle.terminate() {
                warn!(pid = handle.pid, error = %e, "SIGTERM delivery failed");
            }
            if !handle.wait_timeout(timeout) {
                warn!(pid = handle.pid, "graceful stop timed out, killing");
                if let Err(e) = handle.kill() {
                    warn!(pid = handle.pid, error = %e, "SIGKILL delivery failed");
                }
                handle.wait_timeout(KILL_GRACE);
            }
        } else {
            match handle.try_wait() {
                Ok(Some(status)) => debug!(pid = handle.pid, %status, "daemon already exited"),
                _ => debug!(pid = handle.pid, "daemon already exited"),
            }
        }

        if handle.is_running() {
            error!(pid = handle.pid, "daemon did not stop");
            return false;
        }
        // The handle is invalid from here on; a restart spawns fresh.
        self.handle = None;
        true
    }

    /// Block until the daemon's control socket should accept commands.
    fn await_ready(&mut self) {
        match &self.ready {
            ReadyCheck::Delay(delay) => {
                if !delay.is_zero() {
                    std::thread::sleep(*delay);
                }
            }
            ReadyCheck::Probe { cli_path, timeout } => {
                let deadline = Instant::now() + *timeout;
                loop {
                    let answered = Command::new(cli_path)
                        .arg("peer")
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status()
                        .map(|s| s.success())
                        .unwrap_or(false);
                    if answered {
                        debug!("daemon control socket is ready");
                        return;
                    }
                    if Instant::now() >= deadline {
                        warn!("daemon readiness probe timed out, proceeding anyway");
                        return;
                    }
                    std::thread::sleep(PROBE_INTERVAL);
                }
            }
        }
    }
}

impl Drop for DaemonManager {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!("manager dropped, stopping daemon");
            if !self.stop(DEFAULT_STOP_TIMEOUT) {
                warn!("daemon still running after teardown stop");
            }
        }
    }
}

/// Check whether a PID refers to a live process (signal 0 probe).
///
/// Used to verify teardown actually removed the daemon.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleep_manager() -> DaemonManager {
        DaemonManager::new("/bin/sleep").with_ready_check(ReadyCheck::Delay(Duration::ZERO))
    }

    fn sleep_args(secs: u32) -> Vec<String> {
        vec![secs.to_string()]
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let mut manager = sleep_manager();
        let pid1 = manager.start(&sleep_args(30)).expect("first start");
        let pid2 = manager.start(&sleep_args(30)).expect("second start");
        assert_eq!(pid1, pid2);
        assert!(manager.stop(Duration::from_secs(5)));
    }

    #[test]
    fn start_spawns_fresh_after_exit() {
        let mut manager = sleep_manager();
        let pid1 = manager.start(&sleep_args(0)).expect("start");
        // Give the short-lived child time to exit.
        std::thread::sleep(Duration::from_millis(300));
        assert!(!manager.is_running());
        let pid2 = manager.start(&sleep_args(30)).expect("restart");
        assert_ne!(pid1, pid2);
        assert!(manager.stop(Duration::from_secs(5)));
    }

    #[test]
    fn stop_without_start_reports_success() {
        let mut manager = sleep_manager();
        assert!(manager.stop(Duration::from_secs(1)));
    }

    #[test]
    fn stop_twice_reports_success() {
        let mut manager = sleep_manager();
        manager.start(&sleep_args(30)).expect("start");
        assert!(manager.stop(Duration::from_secs(5)));
        assert!(manager.stop(Duration::from_secs(5)));
    }

    #[test]
    fn stop_after_natural_exit_reports_success() {
        let mut manager = sleep_manager();
        manager.start(&sleep_args(0)).expect("start");
        std::thread::sleep(Duration::from_millis(300));
        assert!(manager.stop(Duration::from_secs(1)));
    }

    #[test]
    fn missing_executable_is_a_typed_error() {
        let mut manager = DaemonManager::new("/nonexistent/easytier-core")
            .with_ready_check(ReadyCheck::Delay(Duration::ZERO));
        let err = manager.start(&[]).expect_err("spawn should fail");
        assert!(matches!(err, DaemonError::ExecutableNotFound { .. }));
    }

    #[test]
    fn drop_stops_the_daemon() {
        let mut manager = sleep_manager();
        let pid = manager.start(&sleep_args(30)).expect("start");
        assert!(process_alive(pid));
        drop(manager);
        // SIGTERM kills sleep promptly; allow a moment for reaping.
        std::thread::sleep(Duration::from_millis(200));
        assert!(!process_alive(pid));
    }

    #[test]
    fn probe_ready_check_returns_once_cli_answers() {
        let mut manager = DaemonManager::new("/bin/sleep").with_ready_check(ReadyCheck::Probe {
            cli_path: PathBuf::from("/bin/true"),
            timeout: Duration::from_secs(2),
        });
        let start = Instant::now();
        manager.start(&sleep_args(30)).expect("start");
        // /bin/true answers immediately, so the probe must not wait out the
        // full timeout.
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(manager.stop(Duration::from_secs(5)));
    }
}
