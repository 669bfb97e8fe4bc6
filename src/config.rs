//! Configuration management for the monitor.
use regex::Regex;
use serde::Deserialize;
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use crate::classify::ServerRole;
use crate::constants::DEFAULT_CONFIG_FILES;
use crate::error::MonitorError;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("env var pattern is valid")
});

/// Represents the structure of the configuration file.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Executables of the supervised servers.
    #[serde(default)]
    pub servers: ServersConfig,
    /// Console colors per severity.
    #[serde(default)]
    pub colors: ColorConfig,
    /// Directory relative server paths were resolved against.
    #[serde(skip)]
    pub project_dir: Option<PathBuf>,
}

/// Executable configuration for each server role.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServersConfig {
    /// Login server executable.
    pub login: Option<ServerEntry>,
    /// Char server executable.
    pub char: Option<ServerEntry>,
    /// Map server executable.
    pub map: Option<ServerEntry>,
    /// Web server executable.
    pub web: Option<ServerEntry>,
}

impl ServersConfig {
    fn entries_mut(&mut self) -> impl Iterator<Item = &mut ServerEntry> {
        [&mut self.login, &mut self.char, &mut self.map, &mut self.web]
            .into_iter()
            .flatten()
    }
}

/// A server executable, either as a bare path or with extra launch options.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ServerEntry {
    /// Only the executable path.
    Path(String),
    /// Executable with arguments and an optional working directory.
    Detailed {
        /// Executable path.
        path: String,
        /// Arguments passed on launch.
        #[serde(default)]
        args: Vec<String>,
        /// Working directory; defaults to the executable's directory.
        working_dir: Option<String>,
    },
}

impl ServerEntry {
    /// The configured executable path, possibly quoted or relative.
    pub fn path(&self) -> &str {
        match self {
            Self::Path(path) | Self::Detailed { path, .. } => path,
        }
    }

    /// Arguments passed to the executable.
    pub fn args(&self) -> &[String] {
        match self {
            Self::Path(_) => &[],
            Self::Detailed { args, .. } => args,
        }
    }

    /// Explicit working directory, if any.
    pub fn working_dir(&self) -> Option<&str> {
        match self {
            Self::Path(_) => None,
            Self::Detailed { working_dir, .. } => working_dir.as_deref(),
        }
    }

    /// Anchors relative paths at `base` instead of the current directory.
    fn resolve_relative(&mut self, base: &Path) {
        let anchor = |raw: &mut String| {
            let cleaned = clean_path(raw);
            if !cleaned.is_empty() && !Path::new(cleaned).is_absolute() {
                *raw = base.join(cleaned).to_string_lossy().into_owned();
            }
        };

        match self {
            Self::Path(path) => anchor(path),
            Self::Detailed {
                path, working_dir, ..
            } => {
                anchor(path);
                if let Some(dir) = working_dir {
                    anchor(dir);
                }
            }
        }
    }
}

/// Console colors per severity, as names (`green`, `dark_cyan`) or `#rrggbb`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ColorConfig {
    /// Color of `[Status]` tags.
    pub status: Option<String>,
    /// Color of `[Info]` tags.
    pub info: Option<String>,
    /// Color of `[Notice]` tags.
    pub notice: Option<String>,
    /// Color of `[Warning]` tags.
    pub warning: Option<String>,
    /// Color of `[Error]` tags.
    pub error: Option<String>,
    /// Color of `[SQL]` tags.
    pub sql: Option<String>,
    /// Color of `[Debug]` tags.
    pub debug: Option<String>,
    /// Color of untagged text.
    pub other: Option<String>,
}

impl Config {
    /// The executable entry configured for `role`.
    pub fn server(&self, role: ServerRole) -> Option<&ServerEntry> {
        match role {
            ServerRole::Login => self.servers.login.as_ref(),
            ServerRole::Char => self.servers.char.as_ref(),
            ServerRole::Map => self.servers.map.as_ref(),
            ServerRole::Web => self.servers.web.as_ref(),
        }
    }

    /// Roles that have an executable configured, in start order.
    pub fn configured_roles(&self) -> Vec<ServerRole> {
        ServerRole::ALL
            .into_iter()
            .filter(|role| self.server(*role).is_some())
            .collect()
    }

    /// Image-name lookup table used to resolve the role of a launched process.
    pub fn role_map(&self) -> RoleMap {
        ServerRole::ALL
            .into_iter()
            .fold(RoleMap::default(), |map, role| match self.server(role) {
                Some(entry) => map.with(role, entry.path()),
                None => map,
            })
    }
}

/// Maps normalised executable image names to server roles.
#[derive(Debug, Clone, Default)]
pub struct RoleMap {
    images: Vec<(ServerRole, String)>,
}

impl RoleMap {
    /// Registers the executable configured for `role`.
    pub fn with(mut self, role: ServerRole, executable: &str) -> Self {
        let image = image_name(executable).to_lowercase();
        if !image.is_empty() {
            self.images.push((role, image));
        }
        self
    }

    /// Resolves the role whose configured image name equals `image`, ignoring case.
    pub fn resolve(&self, image: &str) -> Option<ServerRole> {
        let image = image.to_lowercase();
        self.images
            .iter()
            .find(|(_, candidate)| *candidate == image)
            .map(|(role, _)| *role)
    }
}

fn clean_path(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim()
}

/// Normalises a configured executable path: strips surrounding whitespace and quotes
/// and makes it absolute against the current directory.
pub fn normalize_executable(raw: &str) -> PathBuf {
    let path = Path::new(clean_path(raw));
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

/// The bare image name of an executable path, without directory or extension.
pub fn image_name(raw: &str) -> String {
    normalize_executable(raw)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Expands `$VAR` and `${VAR}` references from the environment.
fn expand_env_vars(input: &str) -> Result<String, MonitorError> {
    let mut missing = None;
    let expanded = ENV_VAR_PATTERN.replace_all(input, |caps: &regex::Captures| {
        match env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(MonitorError::MissingEnvVar(name)),
        None => Ok(expanded.into_owned()),
    }
}

fn default_config_path() -> PathBuf {
    DEFAULT_CONFIG_FILES
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]))
}

/// Loads and parses the configuration file, expanding environment variables and
/// anchoring relative server paths at the file's directory.
pub fn load_config(config_path: Option<&str>) -> Result<Config, MonitorError> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    let content = fs::read_to_string(&config_path).map_err(|e| {
        MonitorError::ConfigReadError(io::Error::new(
            e.kind(),
            format!("{} ({})", e, config_path.display()),
        ))
    })?;

    let expanded = expand_env_vars(&content)?;
    let mut config: Config = serde_yaml::from_str(&expanded)?;

    let base_path = config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let base_path = std::path::absolute(base_path).unwrap_or_else(|_| base_path.into());

    for entry in config.servers.entries_mut() {
        entry.resolve_relative(&base_path);
    }
    config.project_dir = Some(base_path);

    Ok(config)
}
