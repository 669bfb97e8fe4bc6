//! Composition root running one supervisor per server role.
use std::{
    collections::BTreeMap,
    sync::mpsc::{self, Receiver, Sender},
    thread::{self, JoinHandle},
};

use tracing::{error, info, warn};

use crate::{
    classify::ServerRole,
    config::{Config, RoleMap},
    error::MonitorError,
    kill::{KillReport, kill_by_name},
    metrics::MetricsAggregator,
    supervisor::{MonitorEvent, ProcessResult, ProcessSupervisor},
};

/// Starts and tracks the configured servers, each on its own supervisor thread.
///
/// All supervisors share one [`MetricsAggregator`] and report to one event channel.
/// The channel closes once the registry and every supervisor thread are gone.
pub struct SupervisorRegistry {
    config: Config,
    roles: RoleMap,
    metrics: MetricsAggregator,
    events: Sender<MonitorEvent>,
    running: BTreeMap<ServerRole, JoinHandle<ProcessResult>>,
}

impl SupervisorRegistry {
    /// Creates a registry and the receiving end of its event channel.
    pub fn new(config: Config, metrics: MetricsAggregator) -> (Self, Receiver<MonitorEvent>) {
        let (events, receiver) = mpsc::channel();
        let roles = config.role_map();
        let registry = Self {
            config,
            roles,
            metrics,
            events,
            running: BTreeMap::new(),
        };
        (registry, receiver)
    }

    /// Aggregator shared by every supervisor.
    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts supervising `role` in the background. A role that is still running is
    /// left alone.
    pub fn start(&mut self, role: ServerRole) -> Result<(), MonitorError> {
        let entry = self
            .config
            .server(role)
            .ok_or(MonitorError::RoleNotConfigured(role))?;

        if self.is_running(role) {
            warn!("{} is already supervised; not starting it again", role.label());
            return Ok(());
        }

        let mut supervisor =
            ProcessSupervisor::new(entry.path(), self.roles.clone(), self.metrics.clone())
                .args(entry.args().iter().cloned())
                .events(self.events.clone());
        if let Some(dir) = entry.working_dir() {
            supervisor = supervisor.working_dir(dir);
        }

        let handle = thread::Builder::new()
            .name(format!("supervise-{role}"))
            .spawn(move || supervisor.run())
            .map_err(|source| MonitorError::SpawnError { role, source })?;

        info!("Supervising {}", role.label());
        self.running.insert(role, handle);
        Ok(())
    }

    /// Starts every configured role and returns the roles that were started.
    pub fn start_all(&mut self) -> Vec<ServerRole> {
        let mut started = Vec::new();
        for role in self.config.configured_roles() {
            match self.start(role) {
                Ok(()) => started.push(role),
                Err(err) => error!("{err}"),
            }
        }
        started
    }

    /// True while the supervisor thread of `role` is alive.
    pub fn is_running(&self, role: ServerRole) -> bool {
        self.running
            .get(&role)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Blocks until the supervisor of `role` finishes and returns its result.
    pub fn wait(&mut self, role: ServerRole) -> Option<ProcessResult> {
        let handle = self.running.remove(&role)?;
        Some(join_supervisor(role, handle))
    }

    /// Blocks until every started supervisor finishes.
    pub fn wait_all(&mut self) -> BTreeMap<ServerRole, ProcessResult> {
        std::mem::take(&mut self.running)
            .into_iter()
            .map(|(role, handle)| (role, join_supervisor(role, handle)))
            .collect()
    }

    /// Kills every process matching the executable configured for `role`.
    pub fn stop(&self, role: ServerRole) -> Result<KillReport, MonitorError> {
        let entry = self
            .config
            .server(role)
            .ok_or(MonitorError::RoleNotConfigured(role))?;
        Ok(kill_by_name(entry.path()))
    }

    /// Kills the processes of every configured role.
    pub fn stop_all(&self) -> Vec<KillReport> {
        self.config
            .configured_roles()
            .into_iter()
            .filter_map(|role| self.stop(role).ok())
            .collect()
    }
}

fn join_supervisor(role: ServerRole, handle: JoinHandle<ProcessResult>) -> ProcessResult {
    handle.join().unwrap_or_else(|_| {
        error!("Supervisor thread for {} panicked", role.label());
        ProcessResult {
            completed: false,
            exit_code: None,
            output: format!("supervisor thread for the {role} server panicked"),
        }
    })
}
