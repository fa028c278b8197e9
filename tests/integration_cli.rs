use assert_cmd::Command;

#[test]
fn list_prints_builtin_tests() {
    let home = tempfile::tempdir().unwrap();
    let out = Command::cargo_bin("ielts-coach")
        .unwrap()
        .env("HOME", home.path())
        .arg("--list")
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("speaking-sample"));
    assert!(stdout.contains("shadowing-sample"));
}

#[test]
fn history_starts_empty() {
    let home = tempfile::tempdir().unwrap();
    let out = Command::cargo_bin("ielts-coach")
        .unwrap()
        .env("HOME", home.path())
        .arg("--history")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("no attempts yet"));
}

#[test]
fn refuses_to_run_without_a_tty() {
    let home = tempfile::tempdir().unwrap();
    Command::cargo_bin("ielts-coach")
        .unwrap()
        .env("HOME", home.path())
        .write_stdin("")
        .assert()
        .failure();
}
