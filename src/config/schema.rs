//! Configuration schema definitions.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::forward::ForwardPolicy;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Virtual-network transport settings.
    #[serde(default)]
    pub network: NetworkTuning,

    /// Daemon lifecycle settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Port-forwarding settings.
    #[serde(default)]
    pub forward: ForwardConfig,

    /// External binary locations.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
}

impl Config {
    /// Merge another config into this one.
    ///
    /// Lists (relay peers) are merged; scalars are overridden when the
    /// other value differs from the built-in default.
    pub fn merge(&mut self, other: Config) {
        self.network.merge(other.network);
        self.daemon.merge(other.daemon);
        self.forward.merge(other.forward);
        self.toolchain.merge(other.toolchain);
    }
}

/// Relay endpoints and transport flags passed to the daemon.
///
/// These are static session configuration, not data derived from the invite
/// code. The defaults match the public relay set and tuning the original
/// connector shipped with.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkTuning {
    /// Relay/bootstrap peer endpoints, tried in order.
    pub peers: Vec<String>,
    /// Tunnel encryption algorithm.
    pub encryption: String,
    /// Payload compression algorithm.
    pub compression: String,
    /// Enable KCP proxy acceleration.
    pub kcp_proxy: bool,
    /// Use the userspace smoltcp stack.
    pub smoltcp: bool,
    /// Run without a TUN device (no elevated privileges needed).
    pub no_tun: bool,
    /// Enable the daemon's multi-threaded runtime.
    pub multi_thread: bool,
    /// Prefer low latency over throughput when routing.
    pub latency_first: bool,
    /// Virtual IPv4 address every lobby host publishes the game on.
    pub game_address: String,
}

impl Default for NetworkTuning {
    fn default() -> Self {
        Self {
            peers: vec![
                "tcp://public2.easytier.cn:54321".to_string(),
                "tcp://101.42.154.32:55558".to_string(),
                "tcp://turn.hn.629957.xyz:14443".to_string(),
                "tcp://119.45.189.143:11010".to_string(),
            ],
            encryption: "chacha20".to_string(),
            compression: "zstd".to_string(),
            kcp_proxy: true,
            smoltcp: true,
            no_tun: true,
            multi_thread: true,
            latency_first: true,
            game_address: "10.114.114.114".to_string(),
        }
    }
}

impl NetworkTuning {
    fn merge(&mut self, other: NetworkTuning) {
        let defaults = NetworkTuning::default();
        for peer in other.peers {
            if !self.peers.contains(&peer) {
                self.peers.push(peer);
            }
        }
        if other.encryption != defaults.encryption {
            self.encryption = other.encryption;
        }
        if other.compression != defaults.compression {
            self.compression = other.compression;
        }
        if other.kcp_proxy != defaults.kcp_proxy {
            self.kcp_proxy = other.kcp_proxy;
        }
        if other.smoltcp != defaults.smoltcp {
            self.smoltcp = other.smoltcp;
        }
        if other.no_tun != defaults.no_tun {
            self.no_tun = other.no_tun;
        }
        if other.multi_thread != defaults.multi_thread {
            self.multi_thread = other.multi_thread;
        }
        if other.latency_first != defaults.latency_first {
            self.latency_first = other.latency_first;
        }
        if other.game_address != defaults.game_address {
            self.game_address = other.game_address;
        }
    }

    /// Parse the configured virtual game address.
    pub fn game_ip(&self) -> Result<Ipv4Addr, ConfigError> {
        self.game_address
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                field: "network.game_address",
                message: format!("{:?} is not an IPv4 address", self.game_address),
            })
    }
}

/// Daemon lifecycle settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Bound on the graceful-stop wait, in seconds.
    pub stop_timeout_secs: u64,
    /// Probe the control CLI for readiness after start instead of sleeping
    /// a fixed delay.
    pub ready_probe: bool,
    /// Deadline for the readiness probe, in seconds.
    pub probe_timeout_secs: u64,
    /// Fixed settle delay after start when probing is disabled, in
    /// milliseconds.
    pub startup_delay_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: 5,
            ready_probe: true,
            probe_timeout_secs: 3,
            startup_delay_ms: 500,
        }
    }
}

impl DaemonConfig {
    fn merge(&mut self, other: DaemonConfig) {
        let defaults = DaemonConfig::default();
        if other.stop_timeout_secs != defaults.stop_timeout_secs {
            self.stop_timeout_secs = other.stop_timeout_secs;
        }
        if other.ready_probe != defaults.ready_probe {
            self.ready_probe = other.ready_probe;
        }
        if other.probe_timeout_secs != defaults.probe_timeout_secs {
            self.probe_timeout_secs = other.probe_timeout_secs;
        }
        if other.startup_delay_ms != defaults.startup_delay_ms {
            self.startup_delay_ms = other.startup_delay_ms;
        }
    }
}

/// Port-forwarding settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// What to do when installing a forwarding rule fails.
    pub policy: ForwardPolicy,
}

impl ForwardConfig {
    fn merge(&mut self, other: ForwardConfig) {
        if other.policy != ForwardPolicy::default() {
            self.policy = other.policy;
        }
    }
}

/// External binary locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Explicit path to `easytier-core` (overrides directory search).
    pub core_bin: Option<PathBuf>,
    /// Explicit path to `easytier-cli` (overrides directory search).
    pub cli_bin: Option<PathBuf>,
    /// Base directory the installer unpacks releases into.
    pub easytier_dir: PathBuf,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            core_bin: None,
            cli_bin: None,
            easytier_dir: PathBuf::from("easytier"),
        }
    }
}

impl ToolchainConfig {
    fn merge(&mut self, other: ToolchainConfig) {
        if other.core_bin.is_some() {
            self.core_bin = other.core_bin;
        }
        if other.cli_bin.is_some() {
            self.cli_bin = other.cli_bin;
        }
        if other.easytier_dir != ToolchainConfig::default().easytier_dir {
            self.easytier_dir = other.easytier_dir;
        }
    }
}
