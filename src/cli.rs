//! Command-line interface for the monitor.
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::classify::ServerRole;

/// Log level accepted either by name (`warn`, `debug`) or as a number from 0 (off)
/// to 5 (trace).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevelArg(pub LevelFilter);

impl LogLevelArg {
    /// Directive suitable for an `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        const BY_NUMBER: [LevelFilter; 6] = [
            LevelFilter::OFF,
            LevelFilter::ERROR,
            LevelFilter::WARN,
            LevelFilter::INFO,
            LevelFilter::DEBUG,
            LevelFilter::TRACE,
        ];

        let trimmed = value.trim();
        if let Ok(number) = trimmed.parse::<usize>() {
            return BY_NUMBER
                .get(number)
                .copied()
                .map(LogLevelArg)
                .ok_or_else(|| format!("unsupported log level number '{number}' (expected 0-5)"));
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "err" => Ok(LogLevelArg(LevelFilter::ERROR)),
            "warning" => Ok(LogLevelArg(LevelFilter::WARN)),
            other => LevelFilter::from_str(other)
                .map(LogLevelArg)
                .map_err(|_| format!("invalid log level '{trimmed}'")),
        }
    }
}

/// Command-line interface for the monitor.
#[derive(Parser)]
#[command(name = "ramon", version, author)]
#[command(about = "Supervises rAthena servers and classifies their console output", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the configured servers and follow their output until they all stop.
    Start {
        /// Path to the configuration file (defaults to `ramon.yaml` or `monitor.yaml`).
        #[arg(short, long)]
        config: Option<String>,

        /// Only start the given roles (login, char, map, web). Repeatable.
        #[arg(short, long = "role", value_name = "ROLE")]
        roles: Vec<ServerRole>,

        /// Print the final counters as JSON instead of a text summary.
        #[arg(long)]
        json: bool,

        /// Disable ANSI colors in output.
        #[arg(long = "no-color")]
        no_color: bool,
    },

    /// Supervise a single executable and report its result.
    Run {
        /// Executable to launch. Its role is resolved against the configuration.
        executable: String,

        /// Path to the configuration file used for role resolution and colors.
        #[arg(short, long)]
        config: Option<String>,

        /// Disable ANSI colors in output.
        #[arg(long = "no-color")]
        no_color: bool,

        /// Arguments passed to the executable.
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },

    /// Kill running processes by executable name.
    Kill {
        /// Executable name or path; every process whose name contains it is killed.
        #[arg(required_unless_present = "role", conflicts_with = "role")]
        name: Option<String>,

        /// Kill the executable configured for this role instead.
        #[arg(short, long)]
        role: Option<ServerRole>,

        /// Path to the configuration file (used with `--role`).
        #[arg(short, long)]
        config: Option<String>,
    },
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
