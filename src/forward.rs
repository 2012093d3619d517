//! Port forwarding into the virtual network.
//!
//! Rules are issued through the daemon's control CLI
//! (`easytier-cli port-forward add <proto> <bind> <dest>`). The controller
//! is write-only and stateless: the daemon's control plane is the source of
//! truth for active rules, and every rule disappears when the daemon stops,
//! so there is nothing to query or remove here.
//!
//! A lobby connection needs all four combinations of {tcp, udp} ×
//! {IPv4 loopback, IPv6 loopback} for game-client compatibility across
//! platforms; [`plan_rules`] produces that set.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

/// Transport protocol of a forwarding rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// TCP forwarding.
    Tcp,
    /// UDP forwarding.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// One forwarding rule: local bind address to virtual-network destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardingRule {
    /// Transport protocol.
    pub protocol: Protocol,
    /// Local address the daemon listens on.
    pub bind_addr: SocketAddr,
    /// Destination inside the virtual network.
    pub dest_addr: SocketAddr,
}

impl fmt::Display for ForwardingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.protocol, self.bind_addr, self.dest_addr)
    }
}

/// What to do when installing a rule fails.
///
/// Lenient keeps going: a missing rule degrades one protocol/family combo
/// while the rest still work. Strict aborts the connect instead, for callers
/// who prefer a hard failure over a partially reachable lobby.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardPolicy {
    /// Log the failure and continue with the remaining rules.
    #[default]
    Lenient,
    /// Fail the whole operation on the first rule error.
    Strict,
}

/// Errors raised while issuing forwarding rules.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The control executable could not be run.
    #[error("failed to run control CLI: {0}")]
    CliUnavailable(#[source] std::io::Error),

    /// The control command reported failure.
    #[error("port-forward add exited with {status}: {stderr}")]
    CommandFailed {
        /// Exit status of the control command.
        status: std::process::ExitStatus,
        /// Captured standard error output.
        stderr: String,
    },
}

/// Build the full rule set exposing `dest` as `local_port` on both loopback
/// addresses over both transports.
pub fn plan_rules(local_port: u16, dest: SocketAddr) -> Vec<ForwardingRule> {
    let binds: [IpAddr; 2] = [
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(Ipv6Addr::LOCALHOST),
    ];
    let mut rules = Vec::with_capacity(4);
    for protocol in [Protocol::Tcp, Protocol::Udp] {
        for bind in binds {
            rules.push(ForwardingRule {
                protocol,
                bind_addr: SocketAddr::new(bind, local_port),
                dest_addr: dest,
            });
        }
    }
    rules
}

/// Issues forwarding rules through the daemon's control CLI.
pub struct PortForwarder {
    cli_path: PathBuf,
    policy: ForwardPolicy,
}

impl PortForwarder {
    /// Create a forwarder that invokes the control CLI at `cli_path`.
    pub fn new(cli_path: impl Into<PathBuf>, policy: ForwardPolicy) -> Self {
        Self {
            cli_path: cli_path.into(),
            policy,
        }
    }

    /// Install a single forwarding rule.
    ///
    /// Runs the control command synchronously and inspects its exit status
    /// and stderr. The caller decides (via policy) whether a failure is
    /// fatal.
    pub fn add_forward(&self, rule: &ForwardingRule) -> Result<(), ForwardError> {
        debug!(%rule, "adding port forward");
        let output = Command::new(&self.cli_path)
            .arg("port-forward")
            .arg("add")
            .arg(rule.protocol.to_string())
            .arg(rule.bind_addr.to_string())
            .arg(rule.dest_addr.to_string())
            .output()
            .map_err(ForwardError::CliUnavailable)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ForwardError::CommandFailed {
                status: output.status,
                stderr,
            });
        }
        Ok(())
    }

    /// Install every rule in `rules` according to the configured policy.
    ///
    /// Returns the number of rules successfully installed. Under
    /// [`ForwardPolicy::Strict`] the first failure is returned instead;
    /// under [`ForwardPolicy::Lenient`] failures are logged and the rest of
    /// the rules still go in.
    pub fn apply(&self, rules: &[ForwardingRule]) -> Result<usize, ForwardError> {
        let mut installed = 0;
        for rule in rules {
            match self.add_forward(rule) {
                Ok(()) => {
                    info!(%rule, "port forward installed");
                    installed += 1;
                }
                Err(e) if self.policy == ForwardPolicy::Strict => return Err(e),
                Err(e) => {
                    error!(%rule, error = %e, "port forward failed, continuing");
                }
            }
        }
        Ok(installed)
    }
}
