//! CLI tests for git-hosts
//!
//! Runs the binary the way Ansible does (`--list`, `--host`) and checks the
//! documents on stdout, plus `--graph` and the error paths.

mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use std::fs;

// Helper to get a command for testing
fn git_hosts_cmd() -> Command {
    let mut cmd = Command::cargo_bin("git-hosts").unwrap();
    cmd.env_remove("GIT_HOSTS_CONFIG")
        .env_remove("GIT_HOSTS_DIRECTORY")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn write_source(tree: &HostsTree, extra: &str) -> std::path::PathBuf {
    let path = tree.path("git_hosts.yml");
    fs::write(
        &path,
        format!(
            "plugin: git_hosts\nhosts_directory: {}\n{}",
            tree.root().display(),
            extra
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_list_outputs_inventory_json() {
    let tree = web_servers_tree();
    let source = write_source(&tree, "");

    let output = git_hosts_cmd()
        .args(["--list", "-c"])
        .arg(&source)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["web_servers"]["hosts"][0], "web01.example.com");
    assert_eq!(json["env_prd"]["hosts"][0], "web01.example.com");
    assert_eq!(
        json["_meta"]["hostvars"]["web01.example.com"]["environment"],
        "PRD"
    );
    assert!(json["all"]["children"]
        .as_array()
        .unwrap()
        .contains(&serde_json::json!("web_servers")));
}

#[test]
fn test_host_outputs_host_vars() {
    let tree = web_servers_tree();

    git_hosts_cmd()
        .args(["--host", "web01.example.com", "-d"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ansible_user\": \"webuser\""))
        .stdout(predicate::str::contains("\"environment\": \"PRD\""));
}

#[test]
fn test_unknown_host_is_empty_object() {
    let tree = web_servers_tree();

    git_hosts_cmd()
        .args(["--host", "nope", "-d"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::diff("{}\n"));
}

#[test]
fn test_config_from_environment_variable() {
    let tree = web_servers_tree();
    let source = write_source(&tree, "environment_mapping:\n  prod: LIVE\n");

    git_hosts_cmd()
        .arg("--list")
        .env("GIT_HOSTS_CONFIG", &source)
        .assert()
        .success()
        .stdout(predicate::str::contains("env_live"));
}

#[test]
fn test_yaml_output() {
    let tree = web_servers_tree();

    git_hosts_cmd()
        .args(["--list", "--yaml", "-d"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("web_servers:"))
        .stdout(predicate::str::contains("hostvars:"));
}

#[test]
fn test_graph_output() {
    let tree = web_servers_tree();

    git_hosts_cmd()
        .args(["--graph", "--no-color", "-d"])
        .arg(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("@all:"))
        .stdout(predicate::str::contains("|--@web_servers:"))
        .stdout(predicate::str::contains("|--web01.example.com"));
}

#[test]
fn test_missing_directory_fails() {
    let tree = HostsTree::new();

    git_hosts_cmd()
        .args(["--list", "-d"])
        .arg(tree.path("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Hosts directory does not exist"));
}

#[test]
fn test_invalid_plugin_name_fails() {
    let tree = web_servers_tree();
    let path = tree.path("other.yml");
    fs::write(&path, "plugin: constructed\nhosts_directory: /tmp\n").unwrap();

    git_hosts_cmd()
        .args(["--list", "-c"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("plugin must be 'git_hosts'"));
}

#[test]
fn test_mode_is_required() {
    git_hosts_cmd().assert().failure();
}

#[test]
fn test_warnings_go_to_stderr() {
    let tree = HostsTree::new().file("prod/hosts_web", "[web]\nweb01 oops\n");

    let output = git_hosts_cmd()
        .args(["--list", "-d"])
        .arg(tree.root())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(serde_json::from_slice::<serde_json::Value>(&output.stdout).is_ok());
    assert!(String::from_utf8_lossy(&output.stderr).contains("oops"));
}
