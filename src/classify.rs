//! Classification of server console output.
//!
//! Every line a supervised server prints goes through [`classify`] exactly once. The
//! function is pure and borrows from the input, so the hot path allocates nothing.
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};

use crate::constants::{
    DEBUG_TAG, ERROR_TAG, LOADING_MARKER, SCRIPT_ERROR_MARKER, SET_USERS_MARKER,
    SQL_TAG, WARNING_TAG,
};

/// The server program a supervised process belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ServerRole {
    /// Account login server; the only role that reports online players.
    Login,
    /// Character server.
    Char,
    /// Map server; script errors count as errors.
    Map,
    /// Web API server; its output is captured but never tallied.
    Web,
}

impl ServerRole {
    /// Every role, in start order.
    pub const ALL: [ServerRole; 4] =
        [ServerRole::Login, ServerRole::Char, ServerRole::Map, ServerRole::Web];

    /// Human readable name used in stop notices.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Login => "Login Server",
            Self::Char => "Char Server",
            Self::Map => "Map Server",
            Self::Web => "Web Server",
        }
    }

    pub(crate) const fn index(&self) -> usize {
        *self as usize
    }

    /// Whether lines from this role are scanned for errors and Debug/SQL/Warning tags.
    pub const fn is_game_server(&self) -> bool {
        !matches!(self, Self::Web)
    }
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Severity derived from the bracketed tag a line carries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// `[Status]`
    Status,
    /// `[Info]`
    Info,
    /// `[Notice]`
    Notice,
    /// `[Warning]`
    Warning,
    /// `[Error]`
    Error,
    /// `[SQL]`
    Sql,
    /// `[Debug]`
    Debug,
    /// No recognised tag.
    Other,
}

impl Severity {
    /// Tags in the order they are searched for when splitting a line for display.
    pub const DISPLAY_PRIORITY: [Severity; 7] = [
        Severity::Status,
        Severity::Info,
        Severity::Notice,
        Severity::Warning,
        Severity::Error,
        Severity::Sql,
        Severity::Debug,
    ];

    /// The literal tag as it appears in server output. `Other` has none.
    pub const fn tag(&self) -> Option<&'static str> {
        match self {
            Self::Status => Some("[Status]"),
            Self::Info => Some("[Info]"),
            Self::Notice => Some("[Notice]"),
            Self::Warning => Some(WARNING_TAG),
            Self::Error => Some(ERROR_TAG),
            Self::Sql => Some(SQL_TAG),
            Self::Debug => Some(DEBUG_TAG),
            Self::Other => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Secondary counter a game-server line can bump besides the error counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tally {
    /// Line carries `[Debug]`.
    Debug,
    /// Line carries `[SQL]`.
    Sql,
    /// Line carries `[Warning]`.
    Warning,
}

impl Tally {
    /// Checked in this order; the first tag found wins.
    const PRIORITY: [(Tally, &'static str); 3] = [
        (Tally::Debug, DEBUG_TAG),
        (Tally::Sql, SQL_TAG),
        (Tally::Warning, WARNING_TAG),
    ];

    /// Log buffer the tallied line is appended to.
    pub const fn category(&self) -> LogCategory {
        match self {
            Self::Debug => LogCategory::Debug,
            Self::Sql => LogCategory::Sql,
            Self::Warning => LogCategory::Warning,
        }
    }
}

/// Key of an accumulated log buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogCategory {
    /// Error lines of one server role.
    RoleErrors(ServerRole),
    /// Error lines of every role combined.
    AllErrors,
    /// Warning lines of the game servers.
    Warning,
    /// SQL lines of the game servers.
    Sql,
    /// Debug lines of the game servers.
    Debug,
    /// Everything the web server prints.
    Web,
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoleErrors(role) => write!(f, "errors.{role}"),
            Self::AllErrors => f.write_str("errors.all"),
            Self::Warning => f.write_str("warning"),
            Self::Sql => f.write_str("sql"),
            Self::Debug => f.write_str("debug"),
            Self::Web => f.write_str("web"),
        }
    }
}

/// A line broken up around its severity tag for colored rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySplit<'a> {
    /// Severity of the first tag found.
    pub severity: Severity,
    /// Text preceding the tag, usually empty.
    pub leading: &'a str,
    /// The tag itself, empty for [`Severity::Other`].
    pub tag: &'static str,
    /// Text following the tag, or the whole line when untagged.
    pub remainder: &'a str,
}

/// Result of classifying one line of a role's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedLine<'a> {
    /// Role whose output produced the line.
    pub role: ServerRole,
    /// The raw line.
    pub line: &'a str,
    /// Severity from the display split.
    pub severity: Severity,
    /// The line counts as an error for `role`.
    pub error: bool,
    pub tally: Option<Tally>,
    /// Online player count reported by the login server.
    pub online: Option<u32>,
    /// `None` when the line is hidden from the console view.
    pub display: Option<DisplaySplit<'a>>,
}

impl ClassifiedLine<'_> {
    /// The buffer this line is primarily routed to, if any.
    pub fn category(&self) -> Option<LogCategory> {
        if self.error {
            Some(LogCategory::RoleErrors(self.role))
        } else if let Some(tally) = self.tally {
            Some(tally.category())
        } else if self.role == ServerRole::Web {
            Some(LogCategory::Web)
        } else {
            None
        }
    }
}

/// Classifies a raw output line produced by a server of the given role.
///
/// Returns `None` for blank lines, which are neither counted nor displayed.
pub fn classify(role: ServerRole, line: &str) -> Option<ClassifiedLine<'_>> {
    if line.trim().is_empty() {
        return None;
    }

    let error = match role {
        ServerRole::Login | ServerRole::Char => line.contains(ERROR_TAG),
        ServerRole::Map => line.contains(ERROR_TAG) || line.contains(SCRIPT_ERROR_MARKER),
        ServerRole::Web => false,
    };

    let online = if role == ServerRole::Login && !error && line.contains(SET_USERS_MARKER)
    {
        Some(parse_online_users(line).unwrap_or(0))
    } else {
        None
    };

    let tally = if role.is_game_server() {
        Tally::PRIORITY
            .iter()
            .find(|(_, tag)| line.contains(*tag))
            .map(|(tally, _)| *tally)
    } else {
        None
    };

    let split = split_display(line);
    let display = (!split.remainder.trim().contains(LOADING_MARKER)).then_some(split);

    Some(ClassifiedLine {
        role,
        line,
        severity: split.severity,
        error,
        tally,
        online,
        display,
    })
}

/// Extracts the player count from a login server `set users` line.
///
/// The count is the third `:`-separated field. Anything malformed yields `None`.
pub fn parse_online_users(line: &str) -> Option<u32> {
    line.split(':').nth(2)?.trim().parse().ok()
}

fn split_display(line: &str) -> DisplaySplit<'_> {
    for severity in Severity::DISPLAY_PRIORITY {
        let Some(tag) = severity.tag() else { continue };
        if let Some(index) = line.find(tag) {
            return DisplaySplit {
                severity,
                leading: &line[..index],
                tag,
                remainder: &line[index + tag.len()..],
            };
        }
    }

    DisplaySplit {
        severity: Severity::Other,
        leading: "",
        tag: "",
        remainder: line,
    }
}
