//! `pcguardctl rules ...` round trips against a live daemon.

use crate::prelude::Daemon;

#[test]
fn a_fresh_daemon_has_no_rules() {
    let daemon = Daemon::start();
    daemon.ctl().args(&["rules", "list"]).passes().stdout_has("No active rules");
}

#[test]
fn adding_a_rule_makes_it_visible_in_the_listing() {
    let daemon = Daemon::start();
    daemon
        .ctl()
        .args(&[
            "rules", "add", "--kind", "url", "--match-kind", "domain", "--pattern", "ads.example.com",
            "--action", "block", "--name", "block-ads",
        ])
        .passes()
        .stdout_has("rule added");

    daemon.ctl().args(&["rules", "list"]).passes().stdout_has("block-ads").stdout_has("ads.example.com");
}

#[test]
fn removing_a_rule_by_its_printed_id_clears_it() {
    let daemon = Daemon::start();
    daemon
        .ctl()
        .args(&[
            "rules", "add", "--kind", "executable", "--pattern", "sketchy.exe", "--action", "block",
            "--name", "block-sketchy",
        ])
        .passes();

    let listing = daemon.ctl().args(&["rules", "list"]).passes();
    let stdout = listing.stdout();
    let id = stdout
        .lines()
        .find(|line| line.contains("block-sketchy"))
        .and_then(|line| line.split_whitespace().next())
        .expect("listing should contain the new rule's id");

    daemon.ctl().args(&["rules", "remove", id]).passes().stdout_has("removed");
    daemon.ctl().args(&["rules", "list"]).passes().stdout_lacks("block-sketchy");
}

#[test]
fn clearing_all_rules_empties_the_listing() {
    let daemon = Daemon::start();
    daemon
        .ctl()
        .args(&["rules", "add", "--kind", "url", "--pattern", "example.com", "--action", "allow"])
        .passes();
    daemon.ctl().args(&["rules", "clear"]).passes().stdout_has("cleared");
    daemon.ctl().args(&["rules", "list"]).passes().stdout_has("No active rules");
}

#[test]
fn removing_an_unknown_rule_id_is_a_no_op() {
    let daemon = Daemon::start();
    daemon.ctl().args(&["rules", "remove", "0000000000000000"]).passes().stdout_has("removed");
}

#[test]
fn an_invalid_rule_id_is_rejected_before_reaching_the_daemon() {
    let daemon = Daemon::start();
    daemon.ctl().args(&["rules", "remove", "not-hex"]).fails().stderr_has("not a valid rule id");
}

#[test]
fn manually_triggering_a_sync_reports_a_rule_set_version() {
    let daemon = Daemon::start();
    daemon.ctl().args(&["rules", "sync"]).passes().stdout_has("rule set version");
}
