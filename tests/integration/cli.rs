#[path = "common/mod.rs"]
mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[cfg(unix)]
use common::{launch_lock, write_config, write_script};

#[test]
fn kill_reports_when_nothing_matches() {
    let temp = tempdir().expect("failed to create tempdir");

    Command::new(assert_cmd::cargo::cargo_bin!("ramon"))
        .current_dir(temp.path())
        .arg("kill")
        .arg("no-such-server-4e2a")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No running process matches 'no-such-server-4e2a'",
        ));
}

#[test]
fn kill_role_requires_configured_executable() {
    let temp = tempdir().expect("failed to create tempdir");
    let config_path = temp.path().join("ramon.yaml");
    std::fs::write(&config_path, "servers:\n  login: ./login-server\n")
        .expect("failed to write config");

    Command::new(assert_cmd::cargo::cargo_bin!("ramon"))
        .arg("kill")
        .arg("--role")
        .arg("char")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .assert()
        .failure()
        .stderr(predicate::str::contains("RoleNotConfigured"));
}

#[test]
fn start_rejects_unknown_role() {
    Command::new(assert_cmd::cargo::cargo_bin!("ramon"))
        .args(["start", "--role", "zone"])
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
fn run_propagates_exit_code_and_prints_transcript() {
    let temp = tempdir().expect("failed to create tempdir");
    let _lock = launch_lock();
    let script = write_script(temp.path(), "map-server", "echo \"[Error] npc crash\"\nexit 3");

    Command::new(assert_cmd::cargo::cargo_bin!("ramon"))
        .current_dir(temp.path())
        .arg("run")
        .arg("--no-color")
        .arg(script.to_str().unwrap())
        .assert()
        .code(3)
        .stdout(predicate::str::contains("Process exited with code 3"))
        .stdout(predicate::str::contains("[Error] npc crash"));
}

#[cfg(unix)]
#[test]
fn start_follows_servers_and_prints_summary() {
    let temp = tempdir().expect("failed to create tempdir");
    let _lock = launch_lock();
    let script = write_script(
        temp.path(),
        "login-server",
        r#"echo "[Status] Server is ready"
echo "[Error] account db unreachable" >&2
echo "set users:1:7"
exit 1"#,
    );
    let config_path = write_config(temp.path(), &[("login", script.as_path())]);

    Command::new(assert_cmd::cargo::cargo_bin!("ramon"))
        .arg("start")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("[login]"))
        .stdout(predicate::str::contains("[Status] Server is ready"))
        .stdout(predicate::str::contains("Online players: 7"))
        .stdout(predicate::str::contains(">>Login Server - stopped<< (exit: 1)"))
        .stdout(predicate::str::contains("Errors: 1 total"))
        .stdout(predicate::str::contains("Online: 7"));
}

#[cfg(unix)]
#[test]
fn start_json_prints_counters() {
    let temp = tempdir().expect("failed to create tempdir");
    let _lock = launch_lock();
    let script = write_script(
        temp.path(),
        "char-server",
        "echo \"[Warning] map cache stale\"\necho \"[SQL] lost link\"\nexit 0",
    );
    let config_path = write_config(temp.path(), &[("char", script.as_path())]);

    Command::new(assert_cmd::cargo::cargo_bin!("ramon"))
        .arg("start")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--json")
        .arg("--no-color")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"warnings\": 1"))
        .stdout(predicate::str::contains("\"sql\": 1"))
        .stdout(predicate::str::contains("\"total_errors\": 0"));
}

#[cfg(unix)]
#[test]
fn start_with_unconfigured_role_launches_nothing() {
    let temp = tempdir().expect("failed to create tempdir");
    let _lock = launch_lock();
    let marker = temp.path().join("launched");
    let script = write_script(
        temp.path(),
        "login-server",
        &format!("touch \"{}\"\nexit 0", marker.display()),
    );
    let config_path = write_config(temp.path(), &[("login", script.as_path())]);

    Command::new(assert_cmd::cargo::cargo_bin!("ramon"))
        .arg("start")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(["--role", "login", "--role", "map"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("RoleNotConfigured(Map)"));

    std::thread::sleep(std::time::Duration::from_millis(300));
    assert!(!marker.exists(), "login server was launched before role validation");
}
