//! `pcguardctl processes ...` and `pcguardctl signatures ...`.

use crate::prelude::Daemon;

#[test]
fn a_fresh_daemon_has_observed_at_least_the_current_process_tree() {
    let daemon = Daemon::start();
    // The Process Monitor snapshots on start; it should have observed
    // something before the first poll tick even fires.
    daemon.ctl().args(&["processes", "list"]).passes();
}

#[test]
fn is_running_reports_false_for_an_implausible_pid() {
    let daemon = Daemon::start();
    daemon.ctl().args(&["processes", "is-running", "999999"]).passes().stdout_has("not running");
}

#[test]
fn kill_by_name_against_an_unmatched_pattern_reports_no_results() {
    let daemon = Daemon::start();
    daemon
        .ctl()
        .args(&["processes", "kill-by-name", "definitely-not-a-real-process-*", "--graceful"])
        .passes();
}

#[test]
fn adding_a_process_signature_succeeds() {
    let daemon = Daemon::start();
    daemon
        .ctl()
        .args(&["signatures", "add", "steam", "--path-glob", "/usr/bin/steam*"])
        .passes()
        .stdout_has("signature added");
}
