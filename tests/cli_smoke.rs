//! Behavioural smoke test for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("groundcrew");
    cmd.assert().failure().stderr(contains("Usage"));
}

#[test]
fn cli_rejects_unknown_subcommands() {
    let mut cmd = cargo_bin_cmd!("groundcrew");
    cmd.arg("launch");
    cmd.assert().failure().stderr(contains("unrecognized"));
}
