//! Termination signals must still remove the invocation context file.

#![cfg(unix)]

use std::path::Path;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;
use tempfile::TempDir;

fn context_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("sls-context-"))
        .collect()
}

fn spawn_deploy(service: &Path, tmp: &Path) -> Child {
    std::fs::write(
        service.join("package.json"),
        serde_json::json!({ "scripts": { "hook:deploy": "sleep 5" } }).to_string(),
    )
    .unwrap();

    Command::new(env!("CARGO_BIN_EXE_sls-hooks"))
        .arg("--service-path")
        .arg(service)
        .arg("deploy")
        .env("TMPDIR", tmp)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap()
}

fn wait_for_context(tmp: &Path) {
    let deadline = Instant::now() + Duration::from_secs(4);
    while context_files(tmp).is_empty() {
        assert!(Instant::now() < deadline, "context file was never written");
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn signal_and_wait(child: &mut Child, signal: &str) -> Option<i32> {
    let status = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg(child.id().to_string())
        .status()
        .unwrap();
    assert!(status.success());
    child.wait().unwrap().code()
}

#[test]
fn test_sigterm_removes_context_file() {
    let service = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    let mut child = spawn_deploy(service.path(), tmp.path());

    wait_for_context(tmp.path());
    let started = Instant::now();
    let code = signal_and_wait(&mut child, "TERM");

    assert_eq!(code, Some(143));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(context_files(tmp.path()), Vec::<String>::new());
}

#[test]
fn test_sigint_removes_context_file() {
    let service = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    let mut child = spawn_deploy(service.path(), tmp.path());

    wait_for_context(tmp.path());
    let code = signal_and_wait(&mut child, "INT");

    assert_eq!(code, Some(130));
    assert_eq!(context_files(tmp.path()), Vec::<String>::new());
}
