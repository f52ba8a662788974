// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Settings live in `config.toml` and can be overridden from the environment
//! with `SNOWFLAKE_` variables, using `__` to separate nested keys
//! (`SNOWFLAKE_CONNECTIONS__DEV__TOKEN`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the configuration file inside the config directory
pub const CONFIG_FILENAME: &str = "config.toml";
/// Connection used when none is named anywhere
pub const DEFAULT_CONNECTION_NAME: &str = "default";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection used when `--connection` is not given
    #[serde(default)]
    pub default_connection_name: Option<String>,
    /// Named connections
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
    /// CLI behaviour
    #[serde(default)]
    pub cli: CliSection,
}

/// `[cli]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliSection {
    /// `[cli.logs]` table
    #[serde(default)]
    pub logs: LogsConfig,
}

fn default_save_logs() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[cli.logs]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Write a log file in addition to console output
    #[serde(default = "default_save_logs")]
    pub save_logs: bool,
    /// Level for the log file (debug, info, warning, error, critical)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the log file
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            save_logs: default_save_logs(),
            level: default_log_level(),
            path: None,
        }
    }
}

impl LogsConfig {
    /// Configured log directory, or the default one
    #[must_use]
    pub fn directory(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_logs_path)
    }
}

/// `[connections.<name>]` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Account identifier, used to derive the host
    #[serde(default)]
    pub account: Option<String>,
    /// Login name
    #[serde(default)]
    pub user: Option<String>,
    /// Access token sent as bearer credentials
    #[serde(default)]
    pub token: Option<String>,
    /// Token type, e.g. `PROGRAMMATIC_ACCESS_TOKEN`, `OAUTH` or `KEYPAIR_JWT`
    #[serde(default)]
    pub authenticator: Option<String>,
    /// Explicit host, overrides the one derived from `account`
    #[serde(default)]
    pub host: Option<String>,
    /// Session database
    #[serde(default)]
    pub database: Option<String>,
    /// Session schema
    #[serde(default)]
    pub schema: Option<String>,
    /// Session warehouse
    #[serde(default)]
    pub warehouse: Option<String>,
    /// Session role
    #[serde(default)]
    pub role: Option<String>,
}

/// Directory holding `config.toml` and logs
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("SNOWFLAKE_HOME") {
        return PathBuf::from(home);
    }

    let legacy = directories::BaseDirs::new().map(|d| d.home_dir().join(".snowflake"));
    if let Some(dir) = legacy.filter(|d| d.is_dir()) {
        return dir;
    }

    directories::ProjectDirs::from("com", "snowflake", "snowcli")
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.snowflake"))
}

/// Log directory used when `[cli.logs] path` is not set
#[must_use]
pub fn default_logs_path() -> PathBuf {
    config_dir().join("logs")
}

/// True when `path` is the default log directory
#[must_use]
pub fn is_default_logs_path(path: &Path) -> bool {
    path == default_logs_path()
}

/// Load configuration from disk and the environment
///
/// An explicitly given file must exist; the default file is optional.
pub fn load(config_file: Option<&Path>) -> Result<Config> {
    let path = config_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config_dir().join(CONFIG_FILENAME));
    tracing::debug!("Loading configuration from {}", path.display());

    let settings = config::Config::builder()
        .add_source(
            config::File::from(path.as_path())
                .format(config::FileFormat::Toml)
                .required(config_file.is_some()),
        )
        .add_source(
            config::Environment::with_prefix("SNOWFLAKE")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

    settings
        .try_deserialize()
        .with_context(|| format!("Invalid configuration in {}", path.display()))
}

impl Config {
    /// Resolve a connection by explicit name, then the configured default, then `default`
    pub fn connection(&self, name: Option<&str>) -> Result<(String, ConnectionConfig)> {
        let name = name
            .map(str::to_string)
            .or_else(|| self.default_connection_name.clone())
            .unwrap_or_else(|| DEFAULT_CONNECTION_NAME.to_string());

        match self.connections.get(&name) {
            Some(connection) => Ok((name, connection.clone())),
            None => {
                let known: Vec<_> = self.connections.keys().map(String::as_str).collect();
                if known.is_empty() {
                    bail!("Connection {name} is not configured. No connections are defined.");
                }
                bail!(
                    "Connection {name} is not configured. Available connections: {}",
                    known.join(", ")
                );
            }
        }
    }
}
