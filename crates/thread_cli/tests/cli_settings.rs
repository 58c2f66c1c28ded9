use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("strongthread-{nanos}-{file_name}"))
}

fn run(store_path: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_thread_cli"))
        .args(args)
        .env("STRONGTHREAD_STORE_PATH", store_path)
        .env("STRONGTHREAD_CONFIG_PATH", store_path.with_extension("config.json"))
        .env("STRONGTHREAD_DISABLE_NOTIFICATIONS", "1")
        .env_remove("STRONGTHREAD_USER")
        .output()
        .expect("failed to run thread_cli")
}

fn json_stdout(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn notification_settings_default_and_update() {
    let store_path = temp_path("cli-notifications.json");

    let defaults = run(&store_path, &["notifications", "--json"]);
    let updated = run(
        &store_path,
        &[
            "notifications",
            "--before",
            "30",
            "--missed",
            "false",
            "--json",
        ],
    );
    let reread = run(&store_path, &["notifications", "--json"]);
    std::fs::remove_file(&store_path).ok();

    let settings = json_stdout(&defaults);
    assert_eq!(settings["enabled"], true);
    assert_eq!(settings["before_task"], 15);
    assert_eq!(settings["inactive_days"], 3);

    assert_eq!(json_stdout(&updated)["before_task"], 30);
    let settings = json_stdout(&reread);
    assert_eq!(settings["before_task"], 30);
    assert_eq!(settings["missed_task"], false);
}

#[test]
fn period_is_stored_per_user() {
    let store_path = temp_path("cli-period.json");

    let set = run(&store_path, &["period", "week", "--user", "alice", "--json"]);
    let alice = run(&store_path, &["period", "--user", "alice", "--json"]);
    let local = run(&store_path, &["period", "--json"]);
    std::fs::remove_file(&store_path).ok();

    assert_eq!(json_stdout(&set)["period"], "week");
    assert_eq!(json_stdout(&alice)["days"], 7);
    assert_eq!(json_stdout(&local)["period"], "month");
}

#[test]
fn theme_is_canonicalised() {
    let store_path = temp_path("cli-theme.json");

    let set = run(&store_path, &["theme", "Dark Mode", "--json"]);
    std::fs::remove_file(&store_path).ok();

    assert_eq!(json_stdout(&set)["theme"], "dark");
}

#[test]
fn poll_sweeps_every_stored_user() {
    let store_path = temp_path("cli-poll.json");
    run(&store_path, &["period", "day", "--user", "alice"]);
    run(&store_path, &["period", "day", "--user", "bob"]);

    let output = run(&store_path, &["poll", "--json"]);
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let report = json_stdout(&output);
    // alice, bob and the invoking "local" user.
    assert_eq!(report["users"], 3);
    assert_eq!(report["failures"], 0);
}

#[test]
fn invalid_config_override_is_rejected() {
    let store_path = temp_path("cli-bad-override.json");

    let output = run(
        &store_path,
        &["list", "--config-override", "poll_interval_secs=soon"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}

#[test]
fn broken_config_file_falls_back_to_defaults() {
    let store_path = temp_path("cli-bad-config.json");
    std::fs::write(store_path.with_extension("config.json"), "{ not json").unwrap();

    let output = run(&store_path, &["period", "--json"]);
    std::fs::remove_file(store_path.with_extension("config.json")).ok();
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    assert_eq!(json_stdout(&output)["period"], "month");
    assert!(String::from_utf8_lossy(&output.stderr).contains("using default configuration"));
}

#[test]
fn unknown_command_reports_parse_error() {
    let store_path = temp_path("cli-unknown.json");

    let output = run(&store_path, &["frobnicate"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("ERROR: invalid_input - "));
}
