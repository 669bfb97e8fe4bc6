//! Constants shared across the monitor.
//!
//! Output markers are matched literally and case-sensitively, exactly as the servers
//! print them.

use std::time::Duration;

// ============================================================================
// Output Markers
// ============================================================================

/// Tag marking an error line.
pub const ERROR_TAG: &str = "[Error]";

/// Tag marking a warning line.
pub const WARNING_TAG: &str = "[Warning]";

/// Tag marking an SQL diagnostic line.
pub const SQL_TAG: &str = "[SQL]";

/// Tag marking a debug line.
pub const DEBUG_TAG: &str = "[Debug]";

/// Map server script failures are reported without an `[Error]` tag.
pub const SCRIPT_ERROR_MARKER: &str = "script error";

/// Login server line that carries the online player count.
pub const SET_USERS_MARKER: &str = "set users";

/// Startup progress noise hidden from the console view.
pub const LOADING_MARKER: &str = "Loading";

// ============================================================================
// Process Supervision
// ============================================================================

/// How long to keep draining output after the process exited when a pipe is still
/// held open, typically by a grandchild that inherited it.
pub const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Exit code reported when the executable could not be launched.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = -1;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration files probed, in order, when no path is given.
pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["ramon.yaml", "monitor.yaml"];
