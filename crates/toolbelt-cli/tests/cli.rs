//! Integration tests for the toolbelt CLI binary.

use std::process::Command;

use tempfile::TempDir;

/// Runs the binary with a scratch HOME and no ambient release settings.
fn toolbelt(home: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_toolbelt"));
    cmd.env("HOME", home.path())
        .env_remove("TOOLBELT_APV")
        .env_remove("TOOLBELT_NETWORK")
        .env_remove("GITHUB_TOKEN");
    cmd
}

#[test]
fn test_help_command() {
    let home = TempDir::new().expect("failed to create temp dir");
    let output = toolbelt(&home)
        .arg("--help")
        .output()
        .expect("failed to run toolbelt");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("release"));
}

#[test]
fn test_version_command() {
    let home = TempDir::new().expect("failed to create temp dir");
    let output = toolbelt(&home)
        .arg("--version")
        .output()
        .expect("failed to run toolbelt");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_release_requires_apv() {
    let home = TempDir::new().expect("failed to create temp dir");
    let output = toolbelt(&home)
        .args(["release", "launcher", "c2", "7", "--network", "internal"])
        .output()
        .expect("failed to run toolbelt");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--apv"));
}

#[test]
fn test_release_rejects_unknown_platform() {
    let home = TempDir::new().expect("failed to create temp dir");
    let output = toolbelt(&home)
        .args([
            "release", "player", "c1", "1", "--network", "main", "--apv", "1/x", "--platform",
            "android",
        ])
        .output()
        .expect("failed to run toolbelt");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown platform"));
}

#[test]
fn test_completions_command() {
    let home = TempDir::new().expect("failed to create temp dir");
    let output = toolbelt(&home)
        .args(["completions", "bash"])
        .output()
        .expect("failed to run toolbelt");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("toolbelt"));
}
