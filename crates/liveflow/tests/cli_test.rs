#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const MANIFEST: &str = r#"
input_security_groups:
  studio:
    ipv4_whitelist: ["203.0.113.0/24"]
inputs:
  main:
    name: main-feed
    type: RTMP_PUSH
    destinations:
      - endpoint: live/main
    input_security_groups: [input_security_group.studio]
channels:
  program:
    class: SINGLE_PIPELINE
    destination:
      - id: out
        type: standard
        url: rtmp://cdn.example.com/live/program
    input_attachment:
      - input_id: input.main
"#;

/// ユーザー設定・マニフェスト探索の影響を受けないコマンド
fn liveflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("liveflow").unwrap();
    cmd.current_dir(dir)
        .env("LIVEFLOW_SETTINGS", dir.join("no-settings.yaml"))
        .env_remove("LIVEFLOW_MANIFEST")
        .env_remove("AWS_REGION")
        .env_remove("AWS_PROFILE")
        .env("NO_COLOR", "1");
    cmd
}

fn project(manifest: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("live.yaml"), manifest).unwrap();
    dir
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let dir = tempfile::tempdir().unwrap();
    liveflow(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MediaLive"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("import"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let dir = tempfile::tempdir().unwrap();
    liveflow(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("liveflow"));
}

#[test]
fn test_validate_valid_manifest() {
    let dir = project(MANIFEST);
    liveflow(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("マニフェストは正常です"))
        .stdout(predicate::str::contains("main"))
        .stdout(predicate::str::contains("program"));
}

#[test]
fn test_validate_reports_field_errors() {
    let dir = project(
        "channels:\n  broken:\n    class: TRIPLE_PIPELINE\n    destination: []\n    input_attachment: []\n",
    );
    liveflow(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("channel.broken"))
        .stderr(predicate::str::contains("class"));
}

#[test]
fn test_validate_reports_dangling_reference() {
    let manifest = MANIFEST.replace("input_id: input.main", "input_id: input.missing");
    let dir = project(&manifest);
    liveflow(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("input.missing"));
}

#[test]
fn test_validate_without_manifest() {
    let dir = tempfile::tempdir().unwrap();
    liveflow(dir.path())
        .args(["validate", "-f"])
        .arg(dir.path().join("absent.yaml"))
        .assert()
        .failure();
}

#[test]
fn test_plan_shows_creations() {
    let dir = project(MANIFEST);
    liveflow(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("input_security_group studio を作成"))
        .stdout(predicate::str::contains("input main を作成"))
        .stdout(predicate::str::contains("channel program を作成"))
        .stdout(predicate::str::contains("3 to create"));
}

#[test]
fn test_plan_with_explicit_manifest_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("studio.yaml");
    fs::write(&path, MANIFEST).unwrap();
    liveflow(dir.path())
        .arg("plan")
        .arg("--manifest")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 to create"));
}

#[test]
fn test_plan_of_empty_manifest_has_no_changes() {
    let dir = project("");
    liveflow(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("変更はありません"));
}

#[test]
fn test_apply_requires_yes() {
    let dir = project(MANIFEST);
    liveflow(dir.path())
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("実行するには --yes オプションを指定してください"));
    assert!(!dir.path().join(".liveflow/state.json").exists());
}

#[test]
fn test_show_with_empty_state() {
    let dir = project(MANIFEST);
    liveflow(dir.path())
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("管理中のリソースはありません"));
}

#[test]
fn test_destroy_with_empty_state() {
    let dir = project(MANIFEST);
    liveflow(dir.path())
        .args(["destroy", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("管理中のリソースはありません"));
}

#[test]
fn test_import_rejects_unknown_kind() {
    let dir = project(MANIFEST);
    liveflow(dir.path())
        .args(["import", "multiplex", "main", "1234"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input_security_group"));
}

/// 無効なコマンドでエラーになることを確認
#[test]
fn test_invalid_command() {
    let dir = tempfile::tempdir().unwrap();
    liveflow(dir.path())
        .arg("invalid-command")
        .assert()
        .failure();
}
