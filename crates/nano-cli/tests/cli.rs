use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir.parent().unwrap().parent().unwrap().to_path_buf()
}

fn demo() -> PathBuf {
    workspace_root().join("demos/counter")
}

fn nanoc() -> Command {
    let mut cmd = Command::cargo_bin("nanoc").unwrap();
    cmd.env_remove("NANO_STACK_SIZE");
    cmd
}

fn project(dir: &Path, files: &[(&str, &str)]) {
    for (name, src) in files {
        fs::write(dir.join(name), src).unwrap();
    }
}

#[test]
fn builds_demo_into_output_dir() {
    let out = tempfile::tempdir().unwrap();
    nanoc()
        .arg("build")
        .arg(demo())
        .arg("-o")
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Built"));

    let stage = fs::read_to_string(out.path().join("stage.gs")).unwrap();
    assert!(stage.contains("list memory"));
    assert!(stage.contains("proc fn_fact slot"));
    let cat = fs::read_to_string(out.path().join("cat.gs")).unwrap();
    assert!(cat.contains("cat.svg"));
    assert!(cat.contains("on \"report\""));
    assert!(!out.path().join("manifest.json").exists());
}

#[test]
fn writes_manifest_on_request() {
    let out = tempfile::tempdir().unwrap();
    nanoc()
        .args(["build", "--manifest", "--stack-size", "256", "-o"])
        .arg(out.path())
        .arg(demo())
        .assert()
        .success();

    let text = fs::read_to_string(out.path().join("manifest.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["stack_size"], 256);
    assert_eq!(json["stage"], "stage");
    assert_eq!(json["units"][0]["output"], "stage.gs");
    assert_eq!(json["units"][1]["source"], "cat.nano");
    assert_eq!(json["units"][1]["functions"][0]["warp"], true);
    assert_eq!(json["units"][0]["functions"][0]["recursive"], true);
    let statics: Vec<&str> = json["statics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(statics, vec!["total", "greeting"]);
}

#[test]
fn verbose_build_reports_each_unit() {
    let out = tempfile::tempdir().unwrap();
    nanoc()
        .args(["build", "-v", "-o"])
        .arg(out.path())
        .arg(demo())
        .assert()
        .success()
        .stderr(predicate::str::contains("Compiling").and(predicate::str::contains("cat.nano")));
}

#[test]
fn checks_demo() {
    nanoc()
        .arg("check")
        .arg(demo())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 unit(s)"));
}

#[test]
fn runs_demo_on_the_vm() {
    nanoc()
        .arg("run")
        .arg(demo())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("counting")
                .and(predicate::str::contains("5! = 120"))
                .and(predicate::str::contains("total = 55")),
        );
}

#[test]
fn small_stack_stops_the_deep_recursion_only() {
    nanoc()
        .arg("run")
        .arg(demo())
        .args(["--stack-size", "8"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("stack overflow")
                .and(predicate::str::contains("5! =").not())
                .and(predicate::str::contains("total = 55")),
        );
}

#[test]
fn answers_are_fed_to_ask() {
    let dir = tempfile::tempdir().unwrap();
    project(
        dir.path(),
        &[("stage.nano", "on flag\n    var name = ask(\"who?\")\n    say(\"hi \" & name)\nend\n")],
    );
    nanoc()
        .arg("run")
        .arg(dir.path())
        .args(["--answer", "Ada"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hi Ada"));
}

#[test]
fn parse_error_is_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    project(dir.path(), &[("stage.nano", "func broken(\n")]);
    nanoc()
        .arg("check")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parse error").and(predicate::str::contains("stage.nano")));
}

#[test]
fn sprite_errors_name_their_file() {
    let dir = tempfile::tempdir().unwrap();
    project(
        dir.path(),
        &[("stage.nano", ""), ("dog.nano", "on flag\n    missing = 1\nend\n")],
    );
    nanoc()
        .arg("check")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("dog.nano").and(predicate::str::contains("undeclared identifier")));
}

#[test]
fn missing_stage_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    project(dir.path(), &[("cat.nano", "")]);
    nanoc()
        .arg("build")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("stage.nano"));
}

#[test]
fn zero_stack_size_is_rejected() {
    nanoc()
        .args(["check", "--stack-size", "0"])
        .arg(demo())
        .assert()
        .failure()
        .stderr(predicate::str::contains("stack size"));
}

#[test]
fn bad_stack_size_env_is_rejected() {
    nanoc()
        .env("NANO_STACK_SIZE", "lots")
        .arg("check")
        .arg(demo())
        .assert()
        .failure()
        .stderr(predicate::str::contains("NANO_STACK_SIZE"));
}

#[test]
fn endless_programs_stop_after_tick_budget() {
    let dir = tempfile::tempdir().unwrap();
    project(
        dir.path(),
        &[("stage.nano", "var n = 0\non flag\n    say(\"start\")\n    forever:\n        n += 1\n    end\nend\n")],
    );
    nanoc()
        .arg("run")
        .arg(dir.path())
        .args(["--ticks", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("start"));
}
