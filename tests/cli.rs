//! End-to-end tests driving the compiled binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn skiff(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_skiff"))
        .args(args)
        .current_dir(dir)
        .env("SKIFF_CONFIG_DIR", dir.join("config-dir"))
        .env("SKIFF_STATE_DIR", dir.join("state-dir"))
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

fn write_config(dir: &Path, key_file: &str) {
    let config_dir = dir.join("config-dir");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        format!(
            r#"
[target]
host = "127.0.0.1"
user = "deploy"
key_file = "{key_file}"
app_dir = "/opt/chat"
service = "chat"

[manifest]
files = ["app.py"]
"#
        ),
    )
    .unwrap();
}

#[test]
fn config_dir_respects_env_override() {
    let dir = tempfile::tempdir().unwrap();
    let out = skiff(dir.path(), &["config", "dir"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.trim().ends_with("config-dir"));
}

#[test]
fn config_validate_fails_without_a_config() {
    let dir = tempfile::tempdir().unwrap();
    let out = skiff(dir.path(), &["config", "validate"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("No config found"));
}

#[test]
fn config_validate_accepts_a_minimal_config() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "/tmp/nonexistent-key");
    let out = skiff(dir.path(), &["config", "validate"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Config is valid"));
}

#[test]
fn config_show_includes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "/tmp/nonexistent-key");
    let out = skiff(dir.path(), &["config", "show"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("port = 8501"));
    assert!(stdout.contains("staging_dir = \"/tmp/skiff-staging\""));
}

#[test]
fn deploy_aborts_before_any_work_when_key_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "/tmp/definitely-missing-skiff-key");
    fs::write(dir.path().join("app.py"), "print('hi')").unwrap();

    let out = skiff(dir.path(), &["deploy", "--yes"]);
    assert!(!out.status.success());
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("SSH key not found"));
    assert!(stderr.contains("No commit, push, or network call was attempted"));
}

#[test]
fn plan_lists_manifest_and_remote_commands() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "/tmp/nonexistent-key");
    fs::write(dir.path().join("app.py"), "print('hi')").unwrap();

    let out = skiff(dir.path(), &["plan"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("app.py"));
    assert!(stdout.contains("sudo systemctl restart chat"));
}

#[test]
fn plan_fails_when_a_declared_artifact_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "/tmp/nonexistent-key");

    let out = skiff(dir.path(), &["plan"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("app.py"));
}

#[test]
fn bundle_writes_a_tarball_of_the_manifest() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "/tmp/nonexistent-key");
    fs::write(dir.path().join("app.py"), "print('hi')").unwrap();

    let output = dir.path().join("out.tar.gz");
    let out = skiff(
        dir.path(),
        &["bundle", "--output", output.to_str().unwrap()],
    );
    assert!(out.status.success());
    assert!(output.is_file());
}

#[test]
fn completions_generate_for_bash() {
    let dir = tempfile::tempdir().unwrap();
    let out = skiff(dir.path(), &["completions", "bash"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("skiff"));
}
