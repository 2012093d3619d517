//! End-to-end session tests against stub daemon binaries.
//!
//! The stubs stand in for `easytier-core` (a process that stays alive until
//! signalled) and `easytier-cli` (logs every invocation so the tests can
//! assert exactly which forwarding rules were requested).

#![cfg(unix)]

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lanlink::config::Config;
use lanlink::connector::{Connector, ConnectorError, SessionState};
use lanlink::daemon::process_alive;
use lanlink::forward::ForwardPolicy;
use lanlink::netutil::FixedPortAllocator;
use lanlink::toolchain::Toolchain;

struct StubToolchain {
    _dir: tempfile::TempDir,
    toolchain: Toolchain,
    cli_log: PathBuf,
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = fs::File::create(&path).expect("create script");
    file.write_all(body.as_bytes()).expect("write script");
    let mut perms = file.metadata().expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// Stub pair where every CLI invocation succeeds.
fn stub_toolchain() -> StubToolchain {
    let dir = tempfile::tempdir().expect("tempdir");
    let cli_log = dir.path().join("cli.log");
    let core = write_script(dir.path(), "easytier-core", "#!/bin/sh\nexec sleep 30\n");
    let cli = write_script(
        dir.path(),
        "easytier-cli",
        &format!("#!/bin/sh\necho \"$@\" >> {}\nexit 0\n", cli_log.display()),
    );
    let toolchain = Toolchain::from_paths(core, cli).expect("stub toolchain");
    StubToolchain {
        _dir: dir,
        toolchain,
        cli_log,
    }
}

/// Stub pair where the readiness probe succeeds but every `port-forward`
/// command fails.
fn failing_forward_toolchain() -> StubToolchain {
    let dir = tempfile::tempdir().expect("tempdir");
    let cli_log = dir.path().join("cli.log");
    let core = write_script(dir.path(), "easytier-core", "#!/bin/sh\nexec sleep 30\n");
    let cli = write_script(
        dir.path(),
        "easytier-cli",
        &format!(
            "#!/bin/sh\necho \"$@\" >> {}\nif [ \"$1\" = \"peer\" ]; then exit 0; fi\n\
             echo 'forward rejected' >&2\nexit 1\n",
            cli_log.display()
        ),
    );
    let toolchain = Toolchain::from_paths(core, cli).expect("stub toolchain");
    StubToolchain {
        _dir: dir,
        toolchain,
        cli_log,
    }
}

fn forward_lines(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .filter(|l| l.starts_with("port-forward add"))
        .map(str::to_string)
        .collect()
}

fn connector(stub: &StubToolchain, config: &Config, port: u16) -> Connector {
    Connector::new("P1A2B-3C4D5-E5F6G", stub.toolchain.clone(), config)
        .expect("valid invite code")
        .with_port_allocator(Box::new(FixedPortAllocator(port)))
}

#[test]
fn connect_installs_four_rules_and_disconnect_stops_daemon() {
    let stub = stub_toolchain();
    let mut connector = connector(&stub, &Config::default(), 25565);

    let local_port = connector.connect().expect("connect");
    assert_eq!(local_port, 25565);
    assert!(connector.is_connected());

    let pid = connector.daemon_pid().expect("daemon pid");
    assert!(process_alive(pid), "daemon should be running");

    // Exactly the four {tcp,udp} x {v4,v6} rules, all targeting the decoded
    // game port on the virtual address.
    let lines = forward_lines(&stub.cli_log);
    assert_eq!(lines.len(), 4, "expected 4 rules, got: {lines:?}");
    for expected in [
        "port-forward add tcp 127.0.0.1:25565 10.114.114.114:6699",
        "port-forward add udp 127.0.0.1:25565 10.114.114.114:6699",
        "port-forward add tcp [::1]:25565 10.114.114.114:6699",
        "port-forward add udp [::1]:25565 10.114.114.114:6699",
    ] {
        assert!(
            lines.iter().any(|l| l == expected),
            "missing rule {expected:?} in {lines:?}"
        );
    }

    assert!(connector.disconnect(), "disconnect should succeed");
    assert_eq!(connector.state(), SessionState::Disconnected);
    std::thread::sleep(Duration::from_millis(200));
    assert!(!process_alive(pid), "daemon should be stopped");

    // A second disconnect is a reported no-op, not an error.
    assert!(connector.disconnect());
}

#[test]
fn connect_while_connected_is_rejected_without_new_rules() {
    let stub = stub_toolchain();
    let mut connector = connector(&stub, &Config::default(), 25566);

    connector.connect().expect("first connect");
    let rules_before = forward_lines(&stub.cli_log).len();

    let err = connector.connect().err().expect("second connect must fail");
    assert!(matches!(err, ConnectorError::AlreadyConnected));
    assert_eq!(
        forward_lines(&stub.cli_log).len(),
        rules_before,
        "a rejected connect must not issue rules"
    );

    assert!(connector.disconnect());
}

#[test]
fn connect_after_disconnect_is_rejected() {
    let stub = stub_toolchain();
    let mut connector = connector(&stub, &Config::default(), 25567);

    connector.connect().expect("connect");
    assert!(connector.disconnect());

    let err = connector.connect().err().expect("reconnect must fail");
    assert!(matches!(err, ConnectorError::SessionClosed));
}

#[test]
fn dropping_an_undisconnected_session_stops_the_daemon() {
    let stub = stub_toolchain();
    let mut connector = connector(&stub, &Config::default(), 25568);

    connector.connect().expect("connect");
    let pid = connector.daemon_pid().expect("daemon pid");
    assert!(process_alive(pid));

    drop(connector);
    std::thread::sleep(Duration::from_millis(300));
    assert!(!process_alive(pid), "drop must tear the daemon down");
}

#[test]
fn lenient_policy_connects_despite_forwarding_failures() {
    let stub = failing_forward_toolchain();
    let mut connector = connector(&stub, &Config::default(), 25569);

    // All four rules fail, but the session still comes up (degraded).
    let local_port = connector.connect().expect("lenient connect succeeds");
    assert_eq!(local_port, 25569);
    assert!(connector.is_connected());
    assert_eq!(forward_lines(&stub.cli_log).len(), 4);

    assert!(connector.disconnect());
}

#[test]
fn strict_policy_aborts_connect_and_stops_daemon() {
    let stub = failing_forward_toolchain();
    let mut config = Config::default();
    config.forward.policy = ForwardPolicy::Strict;
    let mut connector = connector(&stub, &config, 25570);

    let err = connector.connect().err().expect("strict connect must fail");
    assert!(matches!(err, ConnectorError::Forward(_)));
    assert!(!connector.is_connected());

    // The daemon must not be left running after the aborted connect.
    if let Some(pid) = connector.daemon_pid() {
        std::thread::sleep(Duration::from_millis(200));
        assert!(!process_alive(pid), "aborted connect must stop the daemon");
    }
}
