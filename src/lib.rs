//! lanlink: join game lobbies over a mesh VPN tunnel from a short invite code
//!
//! This crate drives an external EasyTier-compatible mesh daemon. Given a
//! human-shareable invite code, it decodes the virtual network's identity,
//! starts the daemon, and forwards a local loopback port into the virtual
//! network so the game client can connect to `127.0.0.1:<port>`.
//!
//! # Architecture
//!
//! - **Protocol**: invite-code decoding (currently the PCL dialect)
//! - **Toolchain**: resolution and precondition checks for the external
//!   `easytier-core` / `easytier-cli` binaries (installation is out of scope)
//! - **Daemon**: lifecycle of the background daemon process with guaranteed
//!   teardown
//! - **Forward**: port-forwarding rules issued through the daemon's control
//!   CLI
//! - **Connector**: the session state machine tying the above together
//!
//! The whole tool is synchronous: a single control thread drives the
//! connector, and the daemon runs as an independent OS process.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod connector;
pub mod daemon;
pub mod forward;
pub mod netutil;
pub mod protocol;
pub mod toolchain;
