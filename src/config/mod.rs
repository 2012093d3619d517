//! Configuration for lanlink.
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. Built-in defaults (the relay list and transport flags the original
//!    tool shipped with)
//! 2. User config: `~/.config/lanlink/config.toml`
//! 3. Additional config file (via `--config` flag)
//! 4. CLI flags (highest priority)
//!
//! Missing config files are not errors; they are skipped. Lists (relay
//! peers) are merged, scalars are overridden when set to a non-default
//! value.

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{Config, DaemonConfig, ForwardConfig, NetworkTuning, ToolchainConfig};
