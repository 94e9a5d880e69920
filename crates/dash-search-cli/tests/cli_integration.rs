#![forbid(unsafe_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn bin() -> PathBuf {
    // Cargo sets this for integration tests.
    PathBuf::from(env!("CARGO_BIN_EXE_dash-search"))
}

/// A command isolated from the caller's environment and `.env`.
fn cmd(dir: &Path) -> Command {
    let mut c = Command::new(bin());
    c.current_dir(dir);
    for key in [
        "DASH_SEARCH_FEATURE_TOGGLES",
        "DASH_SEARCH_PANEL_TITLE_SEARCH",
        "DASH_SEARCH_INCLUDE_PANELS_FLAG",
        "DASH_SEARCH_DEBOUNCE_MS",
        "DASH_SEARCH_PREFS_PATH",
        "DASH_SEARCH_PREFS_BACKEND",
        "DASH_SEARCH_LOG",
        "RUST_LOG",
    ] {
        c.env_remove(key);
    }
    c
}

fn run(dir: &Path, args: &[&str]) -> Output {
    cmd(dir).args(args).output().expect("spawn dash-search")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

fn prefs_json(dir: &Path, extra: &[&str]) -> serde_json::Value {
    let prefs = dir.join("prefs.json");
    let mut args = vec!["--prefs", prefs.to_str().unwrap()];
    args.extend_from_slice(extra);
    args.extend_from_slice(&["prefs", "get", "--json"]);
    let out = run(dir, &args);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    serde_json::from_str(&stdout(&out)).expect("prefs get --json output")
}

#[test]
fn config_reports_mode_from_flags() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["config", "--json"]);
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(json["mode"], "legacy");
    assert_eq!(json["debounce_ms"], 200);

    let out = cmd(dir.path())
        .env("DASH_SEARCH_FEATURE_TOGGLES", "panelTitleSearch")
        .args(["config", "--json", "--debounce-ms", "75"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(json["mode"], "new");
    assert_eq!(json["debounce_ms"], 75);
    assert_eq!(json["feature_toggles"], serde_json::json!(["panelTitleSearch"]));

    let out = run(dir.path(), &["config", "--panel-title-search", "on"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("mode"));
    assert!(stdout(&out).contains("new"));
}

#[test]
fn prefs_set_get_clear_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("prefs.json");
    let prefs_arg = prefs.to_str().unwrap();

    let json = prefs_json(dir.path(), &["--include-panels-flag", "true"]);
    assert_eq!(json["include_panels"], true);
    assert!(json["include_panels_stored"].is_null());
    assert_eq!(json["show_previews"], false);

    let out = run(
        dir.path(),
        &["--prefs", prefs_arg, "prefs", "set", "include-panels", "false"],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&prefs).unwrap()).unwrap();
    assert_eq!(on_disk["dashboard.search.include.panels"], false);

    let json = prefs_json(dir.path(), &["--include-panels-flag", "true"]);
    assert_eq!(json["include_panels"], false);
    assert_eq!(json["include_panels_stored"], false);

    let out = run(dir.path(), &["--prefs", prefs_arg, "prefs", "clear"]);
    assert!(out.status.success());
    let json = prefs_json(dir.path(), &["--include-panels-flag", "true"]);
    assert_eq!(json["include_panels"], true);
    assert!(json["include_panels_stored"].is_null());
}

#[test]
fn flag_off_hides_stored_include_panels() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("prefs.json");
    std::fs::write(&prefs, r#"{"dashboard.search.include.panels": true}"#).unwrap();

    let json = prefs_json(dir.path(), &[]);
    assert_eq!(json["include_panels"], false);
    assert_eq!(json["include_panels_stored"], true);
    assert_eq!(json["include_panels_flag"], false);

    // Setting while the flag is off persists and warns.
    let out = run(
        dir.path(),
        &["--prefs", prefs.to_str().unwrap(), "prefs", "set", "include-panels", "false"],
    );
    assert!(out.status.success());
    assert!(stderr(&out).contains("searchIncludePanels"));
}

#[test]
fn prefs_get_table_lists_both_keys() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("prefs.json");
    let out = run(dir.path(), &["--prefs", prefs.to_str().unwrap(), "prefs", "get"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("include-panels"));
    assert!(text.contains("show-previews"));
    assert!(text.contains("unset"));
}

#[test]
fn replay_rapid_typing_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("rapid.txt");
    std::fs::write(&script, "# rapid typing\n0 g\n50 gr\n100 gra\n").unwrap();
    let out = run(
        dir.path(),
        &[
            "--backend",
            "memory",
            "--panel-title-search",
            "true",
            "replay",
            script.to_str().unwrap(),
        ],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "300\tgra\n");
}

#[test]
fn replay_spaced_typing_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = cmd(dir.path())
        .args(["--backend", "memory", "--panel-title-search", "true", "replay", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"0 a\n250 ab\n")
        .unwrap();
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out), "200\ta\n450\tab\n");
}

#[test]
fn replay_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("legacy.txt");
    std::fs::write(&script, "0 cpu\n10 !tag prod\n").unwrap();
    let out = run(
        dir.path(),
        &["--backend", "memory", "replay", script.to_str().unwrap(), "--json"],
    );
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let lines: Vec<serde_json::Value> = stdout(&out)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["at_ms"], 0);
    assert_eq!(lines[0]["query"]["query"], "cpu");
    assert_eq!(lines[1]["at_ms"], 10);
    assert_eq!(lines[1]["query"]["tags"], serde_json::json!(["prod"]));
    assert_eq!(lines[1]["include_panels"], false);
}

#[test]
fn replay_bad_script_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("bad.txt");
    std::fs::write(&script, "0 a\n100 ab\n50 abc\n").unwrap();
    let out = run(
        dir.path(),
        &["--backend", "memory", "replay", script.to_str().unwrap()],
    );
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("line 3"));
}

#[test]
fn replay_panels_directive_in_legacy_mode_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("panels.txt");
    std::fs::write(&script, "0 !panels on\n").unwrap();
    let out = run(
        dir.path(),
        &["--backend", "memory", "replay", script.to_str().unwrap()],
    );
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("line 1"), "stderr: {}", stderr(&out));
}

#[test]
fn missing_script_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["--backend", "memory", "replay", "does-not-exist.txt"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("error"));
}

#[test]
fn unknown_arguments_exit_2() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(run(dir.path(), &["frobnicate"]).status.code(), Some(2));
    assert_eq!(
        run(dir.path(), &["prefs", "set", "include-panels", "sometimes"])
            .status
            .code(),
        Some(2)
    );
    assert_eq!(run(dir.path(), &["--help"]).status.code(), Some(0));
}
