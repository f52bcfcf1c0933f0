//! End-to-end checks of the `interop` binary that need no GPU.

use std::process::Command;

fn interop(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_interop"))
        .args(args)
        .env("PEERLINK_LOG", "off")
        .output()
        .unwrap()
}

#[test]
fn test_no_arguments_prints_usage() {
    let out = interop(&[]);
    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim(),
        "command:interop <bytes_size_in_KB>"
    );
}

#[test]
fn test_invalid_size_prints_usage() {
    for bad in ["zero", "0", "1.5"] {
        let out = interop(&[bad]);
        assert!(out.status.success(), "exit status for {bad}");
        assert!(String::from_utf8_lossy(&out.stdout).contains("command:interop"));
    }
}

#[test]
fn test_missing_runtime_is_fatal() {
    let out = Command::new(env!("CARGO_BIN_EXE_interop"))
        .args(["4", "--scenario", "ocl-p2p"])
        .env("PEERLINK_LOG", "off")
        .env("PEERLINK_OPENCL_LIB", "/nonexistent/libOpenCL.so.404")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("opencl runtime unavailable"));
}

#[test]
fn test_logs_go_to_stderr() {
    let out = Command::new(env!("CARGO_BIN_EXE_interop"))
        .args(["4", "--scenario", "ocl-p2p"])
        .env("PEERLINK_LOG", "info")
        .env("PEERLINK_OPENCL_LIB", "/nonexistent/libOpenCL.so.404")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("starting"), "stderr: {stderr}");
    assert!(!String::from_utf8_lossy(&out.stdout).contains("starting"));
}
