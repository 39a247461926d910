//! Daemon startup, admin reachability, and graceful shutdown.

use crate::prelude::Daemon;

#[test]
fn a_fresh_daemon_answers_ping() {
    let daemon = Daemon::start();
    daemon.ctl().args(&["ping"]).passes().stdout_has("pong");
}

#[test]
fn system_info_reports_the_noop_filter_when_filtering_is_disabled() {
    let daemon = Daemon::start();
    daemon.ctl().args(&["system-info"]).passes().stdout_has("filter:");
}

#[test]
fn stats_starts_at_zero() {
    let daemon = Daemon::start();
    daemon
        .ctl()
        .args(&["stats"])
        .passes()
        .stdout_has("0 total, 0 blocked, 0 allowed, 0 forwarded, 0 cache hits");
}

#[test]
fn a_second_daemon_cannot_start_against_the_same_data_dir() {
    let daemon = Daemon::start();
    // Reusing the same config (and therefore the same lock file under
    // data-dir) as a running daemon must fail fast rather than racing it.
    let mut cmd = std::process::Command::new(crate::prelude::pcguardd_binary());
    cmd.arg("--config").arg(daemon.admin_socket_path().parent().unwrap().join("pcguard.toml"));
    cmd.env_remove("PCGUARD_CONFIG");
    let status = cmd.status().expect("pcguardd should run");
    assert!(!status.success(), "a second pcguardd against the same data-dir should fail to start");
}

#[test]
fn killing_the_daemon_with_sigterm_removes_the_admin_socket() {
    let daemon = Daemon::start();
    let socket_path = daemon.admin_socket_path().to_path_buf();
    assert!(socket_path.exists());
    drop(daemon);
    assert!(!socket_path.exists(), "admin socket should be removed on graceful shutdown");
}
