//! CLI integration tests

use std::process::Command;

fn kx(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_kx"))
        .args(args)
        .env_remove("KX_API_URL")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = kx(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Kubernetes extension"), "Should show app name");
    assert!(stdout.contains("containers"), "Should show containers command");
    assert!(stdout.contains("deployments"), "Should show deployments command");
    assert!(stdout.contains("events"), "Should show events command");
    assert!(stdout.contains("check"), "Should show check command");
    assert!(stdout.contains("status"), "Should show status command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = kx(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("kx"), "Should show binary name");
}

#[test]
fn test_check_help_lists_pods_and_nodes() {
    let output = kx(&["check", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("pods"));
    assert!(stdout.contains("nodes"));
}

#[test]
fn test_check_pods_requires_namespace() {
    let output = kx(&["check", "pods", "cart"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--namespace"));
}

#[test]
fn test_invalid_duration_fails_before_any_request() {
    let output = kx(&[
        "--api-url",
        "http://127.0.0.1:9",
        "check",
        "pods",
        "--namespace",
        "shop",
        "--duration",
        "soon",
        "cart",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid duration"));
}
