//! Aggregate counters and log buffers shared by every supervisor.
use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{ClassifiedLine, LogCategory, ServerRole, Tally};

/// Point-in-time copy of the aggregate counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Error lines from the login server.
    pub login_errors: u64,
    /// Error lines from the char server.
    pub char_errors: u64,
    /// Error lines from the map server.
    pub map_errors: u64,
    /// Error lines from the web server. Always zero.
    pub web_errors: u64,
    /// Error lines across every role.
    pub total_errors: u64,
    /// `[Warning]` lines.
    pub warnings: u64,
    /// `[SQL]` lines.
    pub sql: u64,
    /// `[Debug]` lines.
    pub debug: u64,
    /// Players online as last reported by the login server.
    pub online: u32,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// Error count of a single role.
    pub fn errors(&self, role: ServerRole) -> u64 {
        match role {
            ServerRole::Login => self.login_errors,
            ServerRole::Char => self.char_errors,
            ServerRole::Map => self.map_errors,
            ServerRole::Web => self.web_errors,
        }
    }
}

#[derive(Debug, Default)]
struct AggregateState {
    role_errors: [u64; 4],
    total_errors: u64,
    warnings: u64,
    sql: u64,
    debug: u64,
    online: u32,
    buffers: HashMap<LogCategory, String>,
}

impl AggregateState {
    fn bump_error(&mut self, role: ServerRole) {
        self.role_errors[role.index()] += 1;
        self.total_errors += 1;
    }

    fn bump_tally(&mut self, tally: Tally) {
        match tally {
            Tally::Debug => self.debug += 1,
            Tally::Sql => self.sql += 1,
            Tally::Warning => self.warnings += 1,
        }
    }

    fn append(&mut self, category: LogCategory, line: &str) {
        let buffer = self.buffers.entry(category).or_default();
        buffer.push_str(line);
        buffer.push('\n');
    }
}

/// Thread-safe handle to the process-wide aggregate state.
///
/// Clones share the same state. Every mutator runs as one critical section, so
/// readers never observe a role counter without its matching combined counter.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    state: Arc<RwLock<AggregateState>>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, AggregateState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AggregateState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Counts an error for `role` and in the combined error counter.
    pub fn record_error(&self, role: ServerRole) {
        self.write().bump_error(role);
    }

    pub fn record_warning(&self) {
        self.write().bump_tally(Tally::Warning);
    }

    pub fn record_sql(&self) {
        self.write().bump_tally(Tally::Sql);
    }

    pub fn record_debug(&self) {
        self.write().bump_tally(Tally::Debug);
    }

    /// Appends a line to the buffer of `category`.
    pub fn append_log(&self, category: LogCategory, line: &str) {
        self.write().append(category, line);
    }

    pub fn set_online(&self, online: u32) {
        self.write().online = online;
    }

    pub fn online(&self) -> u32 {
        self.read().online
    }

    /// Applies every counter and buffer effect of a classified line at once.
    pub fn record(&self, line: &ClassifiedLine<'_>) {
        let mut state = self.write();

        if line.error {
            state.bump_error(line.role);
            state.append(LogCategory::RoleErrors(line.role), line.line);
            state.append(LogCategory::AllErrors, line.line);
        }

        if let Some(tally) = line.tally {
            state.bump_tally(tally);
            state.append(tally.category(), line.line);
        }

        if line.role == ServerRole::Web {
            state.append(LogCategory::Web, line.line);
        }

        if let Some(online) = line.online {
            state.online = online;
        }
    }

    /// Returns the accumulated text of a category buffer.
    pub fn log(&self, category: LogCategory) -> String {
        self.read().buffers.get(&category).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.read();
        MetricsSnapshot {
            login_errors: state.role_errors[ServerRole::Login.index()],
            char_errors: state.role_errors[ServerRole::Char.index()],
            map_errors: state.role_errors[ServerRole::Map.index()],
            web_errors: state.role_errors[ServerRole::Web.index()],
            total_errors: state.total_errors,
            warnings: state.warnings,
            sql: state.sql,
            debug: state.debug,
            online: state.online,
            taken_at: Utc::now(),
        }
    }

    /// Clears every counter and buffer.
    pub fn reset(&self) {
        *self.write() = AggregateState::default();
    }
}
