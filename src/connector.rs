//! The connection session state machine.
//!
//! A [`Connector`] owns one lobby session end to end: it is built from a
//! validated invite code, `connect()` starts the daemon and installs the
//! forwarding rules, `disconnect()` stops the daemon. Sessions are
//! single-use; after disconnecting, a new connector is needed for a new
//! session.
//!
//! Errors that would leave an orphaned daemon behind are handled here:
//! every failure path after the daemon started goes through
//! [`DaemonManager::stop`], and dropping the connector tears the daemon
//! down even if `disconnect()` was never called.

use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, ConfigError, NetworkTuning};
use crate::daemon::{DaemonError, DaemonManager, ReadyCheck};
use crate::forward::{plan_rules, ForwardError, PortForwarder};
use crate::netutil::{EphemeralPortAllocator, PortAllocator};
use crate::protocol::{self, ConnectionParams, InviteProtocol, PclProtocol, ProtocolError};
use crate::toolchain::Toolchain;

/// Lifecycle states of a connection session.
///
/// Transitions only move forward: `Created → Connecting → Connected →
/// Disconnected`. `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built from a validated invite code; nothing spawned yet.
    Created,
    /// `connect()` is in flight.
    Connecting,
    /// Daemon running, forwarding rules issued.
    Connected,
    /// Session over; the connector cannot be reused.
    Disconnected,
}

/// Errors raised by the connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The invite code did not decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Configuration carried an unusable value.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `connect()` was called while a session is already connected.
    ///
    /// Connecting twice would duplicate forwarding rules, so it is
    /// rejected rather than made idempotent.
    #[error("already connected")]
    AlreadyConnected,

    /// `connect()` was called after the session ended.
    #[error("session is closed; create a new connector to reconnect")]
    SessionClosed,

    /// Starting the daemon failed.
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// A forwarding rule failed under the strict policy.
    #[error(transparent)]
    Forward(#[from] ForwardError),

    /// No free local port could be allocated.
    #[error("failed to allocate a local port: {0}")]
    PortAllocation(#[source] std::io::Error),
}

/// One lobby connection session.
pub struct Connector {
    protocol: &'static dyn InviteProtocol,
    params: ConnectionParams,
    manager: DaemonManager,
    forwarder: PortForwarder,
    allocator: Box<dyn PortAllocator>,
    tuning: NetworkTuning,
    stop_timeout: Duration,
    state: SessionState,
    local_port: Option<u16>,
}

impl Connector {
    /// Build a session from a raw invite code.
    ///
    /// The code is decoded here, before any process action; an invalid code
    /// fails construction. The virtual game address from config is parsed
    /// here too, for the same reason.
    pub fn new(
        invite_code: &str,
        toolchain: Toolchain,
        config: &Config,
    ) -> Result<Self, ConnectorError> {
        // Fall back to PCL when no dialect matches so the caller gets the
        // decode error rather than a bare "unknown dialect".
        let proto = protocol::detect(invite_code).unwrap_or(&PclProtocol);
        let params = proto.decode(invite_code)?;
        config.network.game_ip()?;

        info!(
            dialect = proto.name(),
            network = %params.network_name,
            port = params.port,
            "invite code decoded"
        );

        let ready = if config.daemon.ready_probe {
            ReadyCheck::Probe {
                cli_path: toolchain.cli_path.clone(),
                timeout: Duration::from_secs(config.daemon.probe_timeout_secs),
            }
        } else {
            ReadyCheck::Delay(Duration::from_millis(config.daemon.startup_delay_ms))
        };

        Ok(Self {
            protocol: proto,
            params,
            manager: DaemonManager::new(toolchain.core_path).with_ready_check(ready),
            forwarder: PortForwarder::new(toolchain.cli_path, config.forward.policy),
            allocator: Box::new(EphemeralPortAllocator),
            tuning: config.network.clone(),
            stop_timeout: Duration::from_secs(config.daemon.stop_timeout_secs),
            state: SessionState::Created,
            local_port: None,
        })
    }

    /// Replace the local-port allocator (user-pinned port, tests).
    #[must_use]
    pub fn with_port_allocator(mut self, allocator: Box<dyn PortAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    /// The decoded connection parameters.
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session is currently connected.
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// PID of the daemon, once started.
    pub fn daemon_pid(&self) -> Option<u32> {
        self.manager.pid()
    }

    /// The forwarded local port, once connected.
    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    /// Start the daemon and expose the lobby on a local port.
    ///
    /// Returns the local port the game client should connect to. Calling
    /// `connect()` on an already-connected or closed session is rejected;
    /// re-issuing forwarding rules for a live session would duplicate them.
    pub fn connect(&mut self) -> Result<u16, ConnectorError> {
        match self.state {
            SessionState::Created => {}
            SessionState::Connecting | SessionState::Connected => {
                return Err(ConnectorError::AlreadyConnected)
            }
            SessionState::Disconnected => return Err(ConnectorError::SessionClosed),
        }
        self.state = SessionState::Connecting;

        // Validated in `new`; parsed again here (before any side effect)
        // to keep the config the single source of truth.
        let game_ip = self.tuning.game_ip()?;
        let hostname = format!("Client-{}", rand::thread_rng().gen_range(1000..10000));
        let args = self.protocol.start_args(&self.params, &self.tuning, &hostname);

        match self.manager.start(&args) {
            Ok(pid) => info!(pid, network = %self.params.network_name, "joined virtual network"),
            Err(e) => {
                // Nothing spawned; the session may be retried.
                self.state = SessionState::Created;
                return Err(e.into());
            }
        }

        let local_port = match self.allocate_port() {
            Ok(port) => port,
            Err(e) => return Err(self.abort_connect(e)),
        };

        let dest = SocketAddr::V4(SocketAddrV4::new(game_ip, self.params.port));
        let rules = plan_rules(local_port, dest);
        match self.forwarder.apply(&rules) {
            Ok(installed) => {
                if installed < rules.len() {
                    warn!(
                        installed,
                        planned = rules.len(),
                        "some forwarding rules failed; connection may be degraded"
                    );
                }
            }
            Err(e) => return Err(self.abort_connect(e.into())),
        }

        self.state = SessionState::Connected;
        self.local_port = Some(local_port);
        info!(local_port, "lobby reachable at 127.0.0.1:{local_port}");
        Ok(local_port)
    }

    /// Stop the daemon and end the session.
    ///
    /// Safe to call in any state; disconnecting a session that never
    /// connected is a no-op reported as success. Returns `false` only when
    /// the daemon could not be confirmed stopped.
    pub fn disconnect(&mut self) -> bool {
        if self.state != SessionState::Connected {
            info!("not connected, nothing to disconnect");
            return true;
        }
        let stopped = self.manager.stop(self.stop_timeout);
        self.state = SessionState::Disconnected;
        self.local_port = None;
        if stopped {
            info!(network = %self.params.network_name, "disconnected");
        } else {
            warn!("daemon did not confirm stop during disconnect");
        }
        stopped
    }

    fn allocate_port(&self) -> Result<u16, ConnectorError> {
        self.allocator
            .allocate()
            .map_err(ConnectorError::PortAllocation)
    }

    /// Tear down after a mid-connect failure so no daemon is left behind.
    fn abort_connect(&mut self, err: ConnectorError) -> ConnectorError {
        warn!(error = %err, "connect failed, stopping daemon");
        if !self.manager.stop(self.stop_timeout) {
            warn!("daemon did not confirm stop during connect abort");
        }
        self.state = SessionState::Disconnected;
        err
    }
}
