#[path = "common/mod.rs"]
mod common;

#[cfg(unix)]
use common::{launch_lock, write_script};
#[cfg(unix)]
use rathena_monitor::kill::kill_by_name;
#[cfg(unix)]
use std::{
    fs,
    path::Path,
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};
#[cfg(unix)]
use tempfile::tempdir;

#[cfg(unix)]
#[test]
fn kills_every_matching_process_and_reports_pids() {
    let temp = tempdir().expect("failed to create tempdir");
    let mut child = {
        let _lock = launch_lock();
        let script = write_script(
            temp.path(),
            "rmkzone",
            "while true; do sleep 1; done",
        );
        Command::new(&script)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn sleeper")
    };
    let pid = child.id();

    // The process table may not list the new process immediately.
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut report = kill_by_name("\"/opt/rathena/RmkZone.exe\"");
    while !report.killed.contains(&pid) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50));
        report = kill_by_name("\"/opt/rathena/RmkZone.exe\"");
    }

    assert_eq!(report.pattern, "RmkZone");
    assert!(report.killed.contains(&pid), "report: {report:?}");

    let status = child.wait().expect("failed to reap sleeper");
    assert!(status.code().is_none(), "sleeper should die from a signal");
}

#[cfg(unix)]
#[test]
fn kills_process_whose_image_name_exceeds_the_kernel_name_limit() {
    let temp = tempdir().expect("failed to create tempdir");
    let sleep = ["/bin/sleep", "/usr/bin/sleep"]
        .into_iter()
        .map(Path::new)
        .find(|path| path.exists())
        .expect("sleep binary not found");

    let mut child = {
        let _lock = launch_lock();
        let server = temp.path().join("rathena-login-server");
        fs::copy(sleep, &server).expect("failed to copy sleep binary");
        Command::new(&server)
            .arg("30")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn long-named server")
    };
    let pid = child.id();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut report = kill_by_name("rathena-login-server.exe");
    while !report.killed.contains(&pid) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50));
        report = kill_by_name("rathena-login-server.exe");
    }

    assert_eq!(report.pattern, "rathena-login-server");
    assert!(report.killed.contains(&pid), "report: {report:?}");

    let status = child.wait().expect("failed to reap server");
    assert!(status.code().is_none(), "server should die from a signal");
}

#[cfg(unix)]
#[test]
fn unmatched_name_kills_nothing() {
    let report = kill_by_name("definitely-not-running-7c1f");

    assert!(report.killed.is_empty());
    assert!(report.failures.is_empty());
    assert!(report.is_clean());
}

#[test]
fn empty_name_matches_nothing() {
    let report = kill_by_name("  \"\"  ");

    assert!(report.pattern.is_empty());
    assert!(report.killed.is_empty());
}
