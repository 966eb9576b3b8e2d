use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn srpvac_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_srpvac"));
    cmd.env("HOME", home);
    for key in [
        "SRPVAC_CONFIG",
        "SRPVAC_LOG",
        "SRPVAC_LOG_DIR",
        "SRPVAC_UI_COLOR",
        "SRPVAC_SSH_PROGRAM",
        "SRPVAC_CONNECT_RETRIES",
        "SRPVAC_COMMAND_TIMEOUT_SECS",
        "SRPVAC_TOGGLE_MAX_ATTEMPTS",
        "SRPVAC_TOGGLE_BACKOFF_MS",
        "SRPVAC_TOGGLE_BACKOFF_MAX_MS",
        "SRPVAC_VACUUM_SETTLE_MS",
        "SRP_HOST",
        "SRP_USER",
        "SRP_PASS",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    srpvac_cmd(home).args(args).output().expect("run srpvac")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!("srpvac-exit-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

#[test]
fn status_without_host_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["status"]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("SRP_HOST"), "stderr={stderr}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn completion_unknown_shell_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["completion", "nope"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn vacuum_without_procedure_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["vacuum"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_env_number_exits_2() {
    let home = make_temp_home();
    let out = srpvac_cmd(&home)
        .env("SRPVAC_TOGGLE_MAX_ATTEMPTS", "lots")
        .args(["config", "--show"])
        .output()
        .expect("run srpvac");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn zero_toggle_attempts_is_rejected() {
    let home = make_temp_home();
    let out = srpvac_cmd(&home)
        .env("SRPVAC_TOGGLE_MAX_ATTEMPTS", "0")
        .args(["config", "--show"])
        .output()
        .expect("run srpvac");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn missing_ssh_program_exits_20() {
    let home = make_temp_home();
    let out = srpvac_cmd(&home)
        .env("SRP_HOST", "srp.invalid")
        .env("SRPVAC_SSH_PROGRAM", home.join("no-such-ssh"))
        .args(["status"])
        .output()
        .expect("run srpvac");
    assert_eq!(out.status.code(), Some(20));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("failed to connect to srp.invalid"), "stderr={stderr}");
    let _ = std::fs::remove_dir_all(&home);
}
