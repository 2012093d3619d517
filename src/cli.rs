//! Command-line interface definitions for lanlink.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Join a game lobby over a mesh VPN tunnel from a short invite code.
///
/// lanlink decodes the invite code, starts the EasyTier-compatible daemon,
/// and forwards a local loopback port into the lobby's virtual network. The
/// game then connects to `127.0.0.1:<port>`.
#[derive(Parser, Debug)]
#[command(name = "lanlink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run (or omit for normal connect mode).
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Invite code to connect with.
    ///
    /// Prompted for on stdin when omitted.
    pub invite_code: Option<String>,

    /// Path to an additional config file, merged on top of the user config.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Explicit path to the easytier-core executable.
    #[arg(long = "core-bin", value_name = "PATH")]
    pub core_bin: Option<PathBuf>,

    /// Explicit path to the easytier-cli executable.
    #[arg(long = "cli-bin", value_name = "PATH")]
    pub cli_bin: Option<PathBuf>,

    /// Base directory the installer unpacked the daemon release into.
    #[arg(long = "easytier-dir", value_name = "DIR")]
    pub easytier_dir: Option<PathBuf>,

    /// Use a fixed local port instead of picking a free one.
    #[arg(long = "local-port", value_name = "PORT")]
    pub local_port: Option<u16>,

    /// Fail the whole connect on the first forwarding error instead of
    /// continuing with the remaining rules.
    #[arg(long = "strict-forwarding")]
    pub strict_forwarding: bool,

    /// Bound on the graceful daemon-stop wait, in seconds.
    #[arg(long = "stop-timeout", value_name = "SECS")]
    pub stop_timeout: Option<u64>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Subcommands for lanlink.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether an invite code is well-formed, without connecting.
    Verify {
        /// The invite code to check.
        code: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_invite_code() {
        let cli = Cli::try_parse_from(["lanlink", "P1A2B-3C4D5-E5F6G"]).expect("parse");
        assert_eq!(cli.invite_code.as_deref(), Some("P1A2B-3C4D5-E5F6G"));
        assert!(cli.command.is_none());
        assert!(!cli.strict_forwarding);
    }

    #[test]
    fn parses_verify_subcommand() {
        let cli = Cli::try_parse_from(["lanlink", "verify", "P1A2B-3C4D5-E5F6G"]).expect("parse");
        match cli.command {
            Some(Commands::Verify { code }) => assert_eq!(code, "P1A2B-3C4D5-E5F6G"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "lanlink",
            "P1A2B-3C4D5-E5F6G",
            "--core-bin",
            "/opt/et/easytier-core",
            "--local-port",
            "25565",
            "--strict-forwarding",
            "-vv",
        ])
        .expect("parse");
        assert_eq!(cli.local_port, Some(25565));
        assert!(cli.strict_forwarding);
        assert_eq!(cli.verbose, 2);
    }
}
