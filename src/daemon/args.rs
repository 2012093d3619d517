//! Builder for the daemon's startup command line.
//!
//! `easytier-core` is configured entirely through flags; there is no config
//! file handshake. The builder keeps flag spelling in one place so the
//! connector assembles argument lists without string literals scattered
//! around.

/// Builder for `easytier-core` startup arguments.
#[derive(Debug, Default, Clone)]
pub struct CoreArgs {
    args: Vec<String>,
}

impl CoreArgs {
    /// Create an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Keep the daemon attached to the spawning process instead of
    /// daemonizing itself. We manage backgrounding ourselves so the child
    /// stays signalable through its handle.
    pub fn no_detach(self) -> Self {
        self.arg("-d")
    }

    /// Add a relay/bootstrap peer endpoint (repeatable).
    pub fn peer(self, url: &str) -> Self {
        self.arg("-p").arg(url)
    }

    /// Select the tunnel encryption algorithm.
    pub fn encryption_algorithm(self, algo: &str) -> Self {
        self.arg(format!("--encryption-algorithm={algo}"))
    }

    /// Enable KCP proxy acceleration.
    pub fn enable_kcp_proxy(self) -> Self {
        self.arg("--enable-kcp-proxy")
    }

    /// Use the userspace smoltcp stack.
    pub fn use_smoltcp(self) -> Self {
        self.arg("--use-smoltcp")
    }

    /// Run without creating a TUN device. Port forwarding through the
    /// control CLI works without one, and no TUN means no elevated
    /// privileges.
    pub fn no_tun(self) -> Self {
        self.arg("--no-tun")
    }

    /// Select the payload compression algorithm.
    pub fn compression(self, algo: &str) -> Self {
        self.arg(format!("--compression={algo}"))
    }

    /// Enable the daemon's multi-threaded runtime.
    pub fn multi_thread(self) -> Self {
        self.arg("--multi-thread")
    }

    /// Prefer low latency over throughput when routing.
    pub fn latency_first(self) -> Self {
        self.arg("--latency-first")
    }

    /// Set the virtual network name to join.
    pub fn network_name(self, name: &str) -> Self {
        self.arg(format!("--network-name={name}"))
    }

    /// Set the shared network secret.
    pub fn network_secret(self, secret: &str) -> Self {
        self.arg(format!("--network-secret={secret}"))
    }

    /// Set the hostname this node announces to peers.
    pub fn hostname(self, name: &str) -> Self {
        self.arg(format!("--hostname={name}"))
    }

    /// Consume the builder, returning the argument vector.
    pub fn build(self) -> Vec<String> {
        self.args
    }
}
