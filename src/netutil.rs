//! Local port allocation.

use std::io;
use std::net::{Ipv4Addr, TcpListener};

/// Source of free local ports for the forwarded game endpoint.
///
/// The connector treats port discovery as an external concern; tests and
/// callers that already know the port they want can supply their own
/// implementation.
pub trait PortAllocator {
    /// Pick a local port that is currently free.
    fn allocate(&self) -> io::Result<u16>;
}

/// Allocates a free port by binding `127.0.0.1:0` and reading back the
/// kernel's choice.
///
/// The listener is closed before the port is handed out, so the port is
/// only probably free by the time the daemon binds it. That race is
/// acceptable here: ephemeral ports are plentiful and a collision surfaces
/// immediately as a forwarding error.
#[derive(Debug, Default, Clone, Copy)]
pub struct EphemeralPortAllocator;

impl PortAllocator for EphemeralPortAllocator {
    fn allocate(&self) -> io::Result<u16> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
        Ok(listener.local_addr()?.port())
    }
}

/// Always hands out one caller-chosen port.
///
/// Used when the user pins the forwarded port (`--local-port`) and by tests
/// that need a predictable address.
#[derive(Debug, Clone, Copy)]
pub struct FixedPortAllocator(pub u16);

impl PortAllocator for FixedPortAllocator {
    fn allocate(&self) -> io::Result<u16> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_a_bindable_port() {
        let port = EphemeralPortAllocator.allocate().expect("allocate");
        assert_ne!(port, 0);
        // The port should be free again now that the probe listener closed.
        TcpListener::bind((Ipv4Addr::LOCALHOST, port)).expect("port should be bindable");
    }

    #[test]
    fn successive_allocations_return_valid_ports() {
        let a = EphemeralPortAllocator.allocate().expect("allocate");
        let b = EphemeralPortAllocator.allocate().expect("allocate");
        assert_ne!(a, 0);
        assert_ne!(b, 0);
    }
}
