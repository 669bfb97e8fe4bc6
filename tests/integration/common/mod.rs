#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

static LAUNCH_LOCK: Mutex<()> = Mutex::new(());

/// Serialises writing and executing scripts within one test binary so a concurrent
/// fork never holds a script open for writing while it is being executed.
pub fn launch_lock() -> MutexGuard<'static, ()> {
    LAUNCH_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes an executable `/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("failed to mark script executable");
    path
}

/// Writes a config file pointing the given roles at scripts in `dir`.
pub fn write_config(dir: &Path, servers: &[(&str, &Path)]) -> PathBuf {
    let mut yaml = String::from("servers:\n");
    for (role, path) in servers {
        yaml.push_str(&format!("  {role}: \"{}\"\n", path.display()));
    }
    let config_path = dir.join("ramon.yaml");
    fs::write(&config_path, yaml).expect("failed to write config");
    config_path
}
