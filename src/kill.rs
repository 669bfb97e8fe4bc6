//! Terminating server processes by image name.
use std::path::Path;

use serde::Serialize;
use sysinfo::{Process, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::{debug, info, warn};

use crate::config::image_name;

/// A process that matched but could not be killed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KillFailure {
    /// PID of the process that survived.
    pub pid: u32,
    /// Process name as reported by the OS.
    pub name: String,
    /// Why the kill signal was not delivered.
    pub reason: String,
}

/// Outcome of a [`kill_by_name`] scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KillReport {
    /// The bare image name that was searched for.
    pub pattern: String,
    /// PIDs that were sent a kill signal.
    pub killed: Vec<u32>,
    /// Matching processes that could not be killed.
    pub failures: Vec<KillFailure>,
}

impl KillReport {
    /// True when every matching process was killed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Returns true when `process_name` contains the bare image name of `configured`,
/// ignoring case. An empty image name matches nothing.
pub fn image_matches(process_name: &str, configured: &str) -> bool {
    let needle = image_name(configured).to_lowercase();
    !needle.is_empty() && process_name.to_lowercase().contains(&needle)
}

/// Names a process is known by: the OS process name plus the file stems of its
/// executable and of its first command-line argument. Linux truncates the process
/// name to 15 bytes, so long images only match through the latter two.
fn process_images(process: &Process) -> Vec<String> {
    let stem = |path: &Path| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    };

    let mut images = vec![process.name().to_string_lossy().into_owned()];
    images.extend(process.exe().and_then(stem));
    images.extend(
        process
            .cmd()
            .first()
            .and_then(|arg0| stem(Path::new(arg0))),
    );
    images
}

/// Kills every running process whose name contains the image name of `configured`.
///
/// Matching is a case-insensitive substring test so platform suffixes are caught.
/// The process name, executable path and first argument are all checked.
/// Each kill is attempted independently; failures are collected in the report and
/// never stop the scan. The calling process is never a target.
pub fn kill_by_name(configured: &str) -> KillReport {
    let pattern = image_name(configured);
    let mut report = KillReport {
        pattern: pattern.clone(),
        ..KillReport::default()
    };

    let needle = pattern.to_lowercase();
    if needle.is_empty() {
        warn!("Refusing to kill processes for empty name '{configured}'");
        return report;
    }

    let own_pid = sysinfo::get_current_pid().ok();
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing()
            .with_exe(UpdateKind::OnlyIfNotSet)
            .with_cmd(UpdateKind::OnlyIfNotSet),
    );

    for (pid, process) in system.processes() {
        if Some(*pid) == own_pid
            || !process_images(process)
                .iter()
                .any(|image| image.to_lowercase().contains(&needle))
        {
            continue;
        }

        let name = process.name().to_string_lossy();
        debug!("Killing '{name}' (PID {pid}) matching '{pattern}'");
        if process.kill() {
            info!("Killed '{name}' (PID {pid})");
            report.killed.push(pid.as_u32());
        } else {
            let failure = KillFailure {
                pid: pid.as_u32(),
                name: name.into_owned(),
                reason: "kill signal was rejected (process gone or access denied)".into(),
            };
            warn!(
                "Failed to kill '{}' (PID {}): {}",
                failure.name, failure.pid, failure.reason
            );
            report.failures.push(failure);
        }
    }

    report
}
