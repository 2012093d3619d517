//! lanlink binary entry point.
//!
//! Handles CLI parsing, logging setup, configuration loading, and drives one
//! connection session: decode the invite code, start the daemon, announce
//! the forwarded local port, then wait for `exit`/Ctrl-C and tear down.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lanlink::{
    cli::{Cli, Commands},
    config::ConfigLoader,
    connector::Connector,
    netutil::FixedPortAllocator,
    protocol,
    toolchain::Toolchain,
};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    debug!("parsed CLI arguments: {:?}", cli);

    if let Some(Commands::Verify { code }) = &cli.command {
        return verify_code(code);
    }

    let config = ConfigLoader::new()
        .load(&cli)
        .context("failed to load configuration")?;
    debug!("loaded configuration: {:?}", config);

    let toolchain = Toolchain::resolve(
        config.toolchain.core_bin.clone(),
        config.toolchain.cli_bin.clone(),
        &config.toolchain.easytier_dir,
    )
    .context("daemon binaries unavailable (run the installer first)")?;

    let invite_code = match &cli.invite_code {
        Some(code) => code.clone(),
        None => prompt_invite_code()?,
    };

    let mut connector = Connector::new(invite_code.trim(), toolchain, &config)
        .context("failed to create connection session")?;
    if let Some(port) = cli.local_port {
        connector = connector.with_port_allocator(Box::new(FixedPortAllocator(port)));
    }

    // Install the Ctrl-C handler before anything spawns, so an early
    // interrupt still reaches the disconnect path below.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let local_port = connector.connect().context("failed to connect")?;
    println!(
        "Connected to lobby network {}.",
        connector.params().network_name
    );
    println!("Join the game at: 127.0.0.1:{local_port}");
    println!("Type 'exit' (or press Ctrl-C) to disconnect.");

    wait_for_exit(&shutdown);

    if !connector.disconnect() {
        anyhow::bail!("daemon could not be stopped; check for a stray easytier-core process");
    }
    println!("Disconnected.");
    Ok(())
}

/// Handle the `verify` subcommand.
fn verify_code(code: &str) -> Result<()> {
    match protocol::detect(code) {
        Some(proto) => {
            println!("valid {} invite code", proto.name());
            Ok(())
        }
        None => anyhow::bail!("invalid invite code: {code:?}"),
    }
}

/// Prompt for an invite code on stdin.
fn prompt_invite_code() -> Result<String> {
    print!("Enter invite code: ");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("failed to read invite code")?;
    if line.trim().is_empty() {
        anyhow::bail!("no invite code entered");
    }
    Ok(line)
}

/// Block until the user types `exit`, stdin closes, or Ctrl-C fires.
///
/// Stdin is read on a helper thread so the Ctrl-C flag can be polled; the
/// helper is left blocked on stdin at shutdown and dies with the process.
fn wait_for_exit(shutdown: &AtomicBool) {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
        // EOF counts as a request to leave.
        let _ = tx.send("exit".to_string());
    });

    loop {
        if shutdown.load(Ordering::SeqCst) {
            println!();
            return;
        }
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(line) if line.trim().eq_ignore_ascii_case("exit") => return,
            Ok(_) => println!("Type 'exit' (or press Ctrl-C) to disconnect."),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Initialize the tracing subscriber.
///
/// # Verbosity Levels
/// - 0 (default): only warnings and errors
/// - 1 (-v): info level
/// - 2 (-vv): debug level
/// - 3+ (-vvv): trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    Ok(())
}
