#[path = "common/mod.rs"]
mod common;

#[cfg(unix)]
use common::{launch_lock, write_script};
#[cfg(unix)]
use rathena_monitor::{
    classify::{LogCategory, ServerRole, Severity},
    config::RoleMap,
    metrics::MetricsAggregator,
    supervisor::{MonitorEvent, ProcessSupervisor, SupervisorState},
};
#[cfg(unix)]
use std::{fs, sync::mpsc, time::Instant};
#[cfg(unix)]
use tempfile::tempdir;

#[cfg(unix)]
#[test]
fn login_server_scenario() {
    let _lock = launch_lock();
    let temp = tempdir().expect("failed to create tempdir");
    let script = write_script(
        temp.path(),
        "login-server",
        r#"echo "[Status] starting"
echo "[Error] db fail" >&2
echo "set users:5:42"
exit 1"#,
    );

    let metrics = MetricsAggregator::new();
    let (tx, rx) = mpsc::channel();
    let roles = RoleMap::default().with(ServerRole::Login, script.to_str().unwrap());
    let mut supervisor = ProcessSupervisor::new(script.to_str().unwrap(), roles, metrics.clone())
        .events(tx);

    let result = supervisor.run();
    drop(supervisor);

    assert!(result.completed);
    assert_eq!(result.exit_code, Some(1));
    let mut lines: Vec<_> = result.output.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["[Error] db fail", "[Status] starting", "set users:5:42"]);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.login_errors, 1);
    assert_eq!(snapshot.total_errors, 1);
    assert_eq!(snapshot.online, 42);
    assert_eq!(metrics.log(LogCategory::AllErrors), "[Error] db fail\n");

    let events: Vec<_> = rx.iter().collect();
    assert!(events.iter().any(|event| matches!(
        event,
        MonitorEvent::Line(line) if line.severity == Severity::Status && line.text == " starting"
    )));
    let stops: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, MonitorEvent::Stopped { .. }))
        .collect();
    assert_eq!(
        stops,
        vec![&MonitorEvent::Stopped {
            role: ServerRole::Login,
            exit_code: Some(1)
        }]
    );
}

#[cfg(unix)]
#[test]
fn successful_run_discards_transcript() {
    let _lock = launch_lock();
    let temp = tempdir().expect("failed to create tempdir");
    let script = write_script(
        temp.path(),
        "char-server",
        r#"i=0
while [ $i -lt 200 ]; do
  echo "[Info] line $i"
  i=$((i + 1))
done
exit 0"#,
    );

    let mut supervisor = ProcessSupervisor::new(
        script.to_str().unwrap(),
        RoleMap::default().with(ServerRole::Char, "char-server"),
        MetricsAggregator::new(),
    );
    let result = supervisor.run();

    assert_eq!(result.exit_code, Some(0));
    assert!(result.output.is_empty());
    assert_eq!(supervisor.state(), SupervisorState::Exited(Some(0)));
    assert_eq!(supervisor.role(), Some(ServerRole::Char));
}

#[cfg(unix)]
#[test]
fn failed_run_keeps_transcript_in_order() {
    let _lock = launch_lock();
    let temp = tempdir().expect("failed to create tempdir");
    let script = write_script(
        temp.path(),
        "map-server",
        r#"i=0
while [ $i -lt 50 ]; do
  echo "[Status] step $i"
  i=$((i + 1))
done
echo "warning: script error in npc"
exit 2"#,
    );

    let metrics = MetricsAggregator::new();
    let mut supervisor = ProcessSupervisor::new(
        script.to_str().unwrap(),
        RoleMap::default().with(ServerRole::Map, "map-server"),
        metrics.clone(),
    );
    let result = supervisor.run();

    let mut expected: String = (0..50).map(|i| format!("[Status] step {i}\n")).collect();
    expected.push_str("warning: script error in npc\n");
    assert_eq!(result.exit_code, Some(2));
    assert_eq!(result.output, expected);
    assert_eq!(metrics.snapshot().map_errors, 1);
}

#[cfg(unix)]
#[test]
fn working_directory_defaults_to_executable_dir() {
    let _lock = launch_lock();
    let temp = tempdir().expect("failed to create tempdir");
    let bin_dir = temp.path().join("bin");
    fs::create_dir_all(&bin_dir).expect("failed to create bin dir");
    let script = write_script(&bin_dir, "web-server", "pwd -P\nexit 3");

    let mut supervisor = ProcessSupervisor::new(
        format!("  \"{}\"  ", script.display()),
        RoleMap::default(),
        MetricsAggregator::new(),
    );
    let result = supervisor.run();

    let expected = fs::canonicalize(&bin_dir).expect("canonical bin dir");
    assert_eq!(result.output.trim_end(), expected.to_str().unwrap());
}

#[cfg(unix)]
#[test]
fn explicit_working_directory_and_args_are_used() {
    let _lock = launch_lock();
    let temp = tempdir().expect("failed to create tempdir");
    let work = temp.path().join("work");
    fs::create_dir_all(&work).expect("failed to create work dir");
    let script = write_script(temp.path(), "web-server", "pwd -P\necho \"$1 $2\"\nexit 4");

    let mut supervisor =
        ProcessSupervisor::new(script.to_str().unwrap(), RoleMap::default(), MetricsAggregator::new())
            .args(["--port", "8888"])
            .working_dir(&work);
    let result = supervisor.run();

    let expected = fs::canonicalize(&work).expect("canonical work dir");
    assert_eq!(
        result.output,
        format!("{}\n--port 8888\n", expected.display())
    );
}

#[cfg(unix)]
#[test]
fn run_finishes_when_grandchild_keeps_pipe_open() {
    let _lock = launch_lock();
    let temp = tempdir().expect("failed to create tempdir");
    let script = write_script(temp.path(), "char-server", "sleep 5 &\necho \"[Status] up\"\nexit 0");

    let started = Instant::now();
    let mut supervisor = ProcessSupervisor::new(
        script.to_str().unwrap(),
        RoleMap::default().with(ServerRole::Char, "char-server"),
        MetricsAggregator::new(),
    );
    let result = supervisor.run();

    assert_eq!(result.exit_code, Some(0));
    assert!(
        started.elapsed().as_secs_f32() < 4.0,
        "run waited for the grandchild instead of finalising after exit"
    );
}

#[cfg(unix)]
#[test]
fn non_executable_file_fails_to_start() {
    let _lock = launch_lock();
    let temp = tempdir().expect("failed to create tempdir");
    let path = temp.path().join("login-server");
    fs::write(&path, "not a program").expect("failed to write file");

    let (tx, rx) = mpsc::channel();
    let mut supervisor = ProcessSupervisor::new(
        path.to_str().unwrap(),
        RoleMap::default().with(ServerRole::Login, "login-server"),
        MetricsAggregator::new(),
    )
    .events(tx);
    let result = supervisor.run();
    drop(supervisor);

    assert!(result.completed);
    assert_eq!(result.exit_code, Some(-1));
    assert!(result.output.contains("login-server"));
    assert_eq!(rx.iter().count(), 0);
}
