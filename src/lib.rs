//! rathena-monitor supervises the login, char, map and web servers of an rAthena
//! installation. Each server runs under its own supervisor, which captures both
//! output streams, classifies every line by role and severity, and keeps shared
//! error, warning, SQL and debug counters alongside per-category log buffers.

/// Line classification.
pub mod classify;

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Shared constants and output markers.
pub mod constants;

/// Terminal rendering of monitor events.
pub mod display;

/// Error handling.
pub mod error;

/// Killing server processes by name.
pub mod kill;

/// Aggregate counters and log buffers.
pub mod metrics;

/// One supervisor per server role.
pub mod registry;

/// Supervision of a single server process.
pub mod supervisor;
