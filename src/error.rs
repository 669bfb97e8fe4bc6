//! Error handling for the monitor.
use thiserror::Error;

use crate::classify::{ServerRole, Severity};

/// Errors raised while configuring or orchestrating supervisors.
///
/// Supervision itself never fails: launch failures and abnormal exits are reported
/// through [`crate::supervisor::ProcessResult`].
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Error reading or accessing a configuration file.
    #[error("Failed to read config file: {0}")]
    ConfigReadError(#[from] std::io::Error),

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// A `${VAR}` reference in the configuration has no value.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A color preference could not be parsed.
    #[error("Invalid color '{value}' for severity '{severity}'")]
    InvalidColor {
        /// Severity the color was configured for.
        severity: Severity,
        /// The rejected value.
        value: String,
    },

    /// An operation needs an executable path for a role that has none.
    #[error("No executable configured for the {0} server")]
    RoleNotConfigured(ServerRole),

    /// The background thread for a supervisor could not be created.
    #[error("Failed to start supervisor thread for the {role} server: {source}")]
    SpawnError {
        /// Role the supervisor was meant for.
        role: ServerRole,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },
}
