// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write file");
}

fn run_success(root: &Path, args: &[&str]) -> String {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mantic"));
    let assert = cmd.current_dir(root).args(args).assert().success();
    String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8")
}

fn run_json(root: &Path, args: &[&str]) -> Value {
    serde_json::from_str(&run_success(root, args)).expect("json parse")
}

fn auth_fixture(root: &Path) {
    write_file(
        &root.join("src/auth/login.ts"),
        "export function login() {}\nexport function redirect() {}\n",
    );
    write_file(
        &root.join("src/auth/session.ts"),
        "import { login } from './login';\nexport const store = {};\n",
    );
    write_file(&root.join("src/ui/Button.tsx"), "export const Button = 1;\n");
}

#[test]
fn session_lifecycle_start_list_info_end() {
    let dir = TempDir::new().expect("tempdir");
    auth_fixture(dir.path());

    let started = run_json(dir.path(), &["session", "start", "fix-auth", "-i", "auth work"]);
    let id = started["id"].as_str().expect("id").to_string();
    assert!(id.starts_with("session-"));
    assert_eq!(started["name"], "fix-auth");
    assert_eq!(started["status"], "active");
    assert_eq!(started["intent"], "auth work");

    let listed = run_json(dir.path(), &["session", "list"]);
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["id"] == id.as_str()));

    let info = run_json(dir.path(), &["session", "info", &id]);
    assert_eq!(info["session"]["meta"]["id"], id.as_str());

    let ended = run_json(dir.path(), &["session", "end", &id]);
    assert_eq!(ended["status"], "ended");

    let document = dir
        .path()
        .join(".mantic/sessions")
        .join(format!("{id}.json"));
    assert!(document.exists());
}

#[test]
fn prior_views_boost_the_next_query_in_the_session() {
    let dir = TempDir::new().expect("tempdir");
    auth_fixture(dir.path());

    run_json(dir.path(), &["session", "start", "fix-auth"]);

    // First query records views of its top files.
    let first = run_json(dir.path(), &["login", "bug", "--session", "fix-auth"]);
    assert_eq!(first["files"][0]["path"], "src/auth/login.ts");

    // Baseline for the follow-up, without session state.
    let plain_dir = TempDir::new().expect("tempdir");
    auth_fixture(plain_dir.path());
    let baseline = run_json(plain_dir.path(), &["login", "redirect"]);
    let baseline_score = baseline["files"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["path"] == "src/auth/login.ts")
        .map(|f| f["relevanceScore"].as_f64().unwrap())
        .expect("baseline login score");

    let second = run_json(dir.path(), &["login", "redirect", "--session", "fix-auth"]);
    let boosted = second["files"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["path"] == "src/auth/login.ts")
        .expect("login in follow-up");

    // One prior view is worth at least 10, plus 20 for recency.
    assert!(boosted["relevanceScore"].as_f64().unwrap() >= baseline_score + 30.0);
    let reasons: Vec<&str> = boosted["matchReasons"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(reasons.iter().any(|r| r.starts_with("viewed")));

    let info = run_json(dir.path(), &["session", "info", "fix-auth"]);
    assert_eq!(info["session"]["meta"]["queryCount"], 2);
    let views = info["session"]["files"]["src/auth/login.ts"]["viewCount"]
        .as_u64()
        .expect("view count");
    assert!(views >= 2);
}

#[test]
fn searching_with_unknown_session_fails() {
    let dir = TempDir::new().expect("tempdir");
    auth_fixture(dir.path());

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mantic"));
    cmd.current_dir(dir.path())
        .args(["login", "--session", "no-such-session"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("'no-such-session' was not found"));
}

#[test]
fn ending_without_id_ends_most_recent_active_session() {
    let dir = TempDir::new().expect("tempdir");
    auth_fixture(dir.path());

    run_json(dir.path(), &["session", "start", "older"]);
    std::thread::sleep(std::time::Duration::from_millis(15));
    let newer = run_json(dir.path(), &["session", "start", "newer"]);

    let ended = run_json(dir.path(), &["session", "end"]);
    assert_eq!(ended["id"], newer["id"]);
    assert_eq!(ended["status"], "ended");
}
