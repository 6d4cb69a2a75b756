//! CLI integration tests: argument parsing and error-path behavior, run
//! against the built `flowfile` binary rather than in-process. Commands
//! that need a live `flowfile-server` are not exercised here; the fixed
//! points are clap's own parsing contract and how network/parse errors
//! are surfaced on exit.

use assert_cmd::Command;
use predicates::prelude::*;

fn flowfile() -> Command {
    Command::cargo_bin("flowfile").unwrap()
}

#[test]
fn help_lists_the_top_level_subcommands() {
    flowfile()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("flow"))
        .stdout(predicate::str::contains("node"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("kinds"));
}

#[test]
fn missing_subcommand_fails_with_usage() {
    flowfile().assert().failure();
}

#[test]
fn node_add_rejects_a_malformed_position() {
    flowfile()
        .args([
            "--server",
            "http://127.0.0.1:1",
            "node",
            "add",
            "--flow-id",
            "1",
            "read_csv",
            "--position",
            "not-a-point",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid position"));
}

#[test]
fn flow_get_against_an_unreachable_server_exits_nonzero() {
    // Port 1 is reserved and nothing answers there, so the client's
    // connection attempt fails fast without touching the network.
    flowfile()
        .args(["--server", "http://127.0.0.1:1", "--timeout-secs", "1", "flow", "get", "--flow-id", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn node_settings_rejects_invalid_json_on_stdin() {
    flowfile()
        .args([
            "--server",
            "http://127.0.0.1:1",
            "node",
            "settings",
            "--flow-id",
            "1",
            "1",
            "-",
        ])
        .write_stdin("not json")
        .assert()
        .failure();
}
