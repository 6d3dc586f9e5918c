//! Configuration handling for schema reconciliation
//!
//! A configuration file carries one endpoint block per side (`source` and
//! `target`), plus optional `reconcile` and `logging` tables. TOML is the
//! default format; files ending in `.json` are read as JSON. The PascalCase
//! keys of older JSON configs (`Source`, `DBHost`, `PrivateKey`, ...) are
//! accepted as aliases.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default SSH port when `port` is omitted
pub const DEFAULT_SSH_PORT: u16 = 22;
/// Default MySQL port when `db_port` is omitted
pub const DEFAULT_DB_PORT: u16 = 3306;

/// Load configuration from a TOML or JSON file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let config = if is_json {
        parse_json(&config_str)?
    } else {
        parse_toml(&config_str)?
    };

    config.validate()?;
    Ok(config)
}

/// Parse a TOML configuration document
pub fn parse_toml(input: &str) -> Result<Config> {
    toml::from_str(input)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))
}

/// Parse a JSON configuration document
pub fn parse_json(input: &str) -> Result<Config> {
    serde_json::from_str(input)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))
}

/// Represents the complete reconciliation configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(alias = "Source")]
    pub source: EndpointConfig,
    #[serde(alias = "Target")]
    pub target: EndpointConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Check both endpoints for missing or contradictory settings
    pub fn validate(&self) -> Result<()> {
        self.source.validate("source")?;
        self.target.validate("target")
    }
}

/// How an endpoint reaches its database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    #[default]
    Tcp,
    Ssh,
}

/// Connection settings for one side of the reconciliation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EndpointConfig {
    #[serde(default, alias = "Mode")]
    pub mode: ConnectionMode,
    /// SSH host, only used in ssh mode
    #[serde(default, alias = "Host")]
    pub host: Option<String>,
    /// SSH port, only used in ssh mode
    #[serde(default, alias = "Port", deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    #[serde(default, alias = "User")]
    pub user: Option<String>,
    #[serde(default, alias = "Password")]
    pub password: Option<String>,
    #[serde(default, alias = "PrivateKey", alias = "private_key_path")]
    pub private_key: Option<PathBuf>,
    #[serde(default = "default_db_host", alias = "DBHost")]
    pub db_host: String,
    #[serde(default, alias = "DBPort", deserialize_with = "deserialize_port")]
    pub db_port: Option<u16>,
    #[serde(alias = "DBUser")]
    pub db_user: String,
    #[serde(default, alias = "DBPassword")]
    pub db_password: String,
    #[serde(alias = "Database")]
    pub database: String,
    #[serde(default = "default_charset", alias = "Charset")]
    pub charset: String,
}

impl EndpointConfig {
    /// SSH port, falling back to 22
    pub fn ssh_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SSH_PORT)
    }

    /// Database port, falling back to 3306
    pub fn database_port(&self) -> u16 {
        self.db_port.unwrap_or(DEFAULT_DB_PORT)
    }

    /// SSH host, ignoring blank values left over from older configs
    pub fn ssh_host(&self) -> Option<&str> {
        non_blank(self.host.as_deref())
    }

    pub fn ssh_user(&self) -> Option<&str> {
        non_blank(self.user.as_deref())
    }

    pub fn ssh_password(&self) -> Option<&str> {
        non_blank(self.password.as_deref())
    }

    /// Private key file with a leading `~` expanded to the home directory
    pub fn private_key_path(&self) -> Option<PathBuf> {
        let path = self
            .private_key
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())?;
        Some(match path.to_str() {
            Some(raw) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
            None => path.to_path_buf(),
        })
    }

    fn validate(&self, side: &str) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(Error::ConfigError(format!("{}: `database` must be set", side)));
        }
        if self.db_user.trim().is_empty() {
            return Err(Error::ConfigError(format!("{}: `db_user` must be set", side)));
        }
        if self.mode == ConnectionMode::Ssh {
            if self.ssh_host().is_none() {
                return Err(Error::ConfigError(format!("{}: ssh mode requires `host`", side)));
            }
            if self.ssh_user().is_none() {
                return Err(Error::ConfigError(format!("{}: ssh mode requires `user`", side)));
            }
            if self.ssh_password().is_none() && self.private_key_path().is_none() {
                return Err(Error::ConfigError(format!(
                    "{}: ssh mode requires `password` or `private_key`",
                    side
                )));
            }
        }
        Ok(())
    }
}

/// Credential-free description of an endpoint, for logs
impl fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.db_user,
            self.db_host,
            self.database_port(),
            self.database
        )?;
        if self.mode == ConnectionMode::Ssh {
            write!(
                f,
                " via ssh {}@{}:{}",
                self.ssh_user().unwrap_or("?"),
                self.ssh_host().unwrap_or("?"),
                self.ssh_port()
            )?;
        }
        Ok(())
    }
}

/// What to do with orphaned tables and columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Ask the operator for every orphan
    #[default]
    Prompt,
    /// Leave every orphan in place
    Skip,
    /// Drop every orphan without asking
    Delete,
}

/// Which side's type a renamed column keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RenameTypeRule {
    /// Keep the orphaned column's existing type; only the name changes
    #[default]
    Target,
    /// Adopt the type of the same-named source column, when there is one
    Source,
}

/// Reconciliation behavior configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub orphans: OrphanPolicy,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub rename_column_type: RenameTypeRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Coerce a textual port. Blank means "not set".
pub fn coerce_port(raw: &str) -> std::result::Result<Option<u16>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u16>()
        .map(Some)
        .map_err(|_| format!("invalid port `{}`: expected a number between 0 and 65535", raw))
}

/// Ports may arrive as numbers or numeric strings; both become a `u16` here.
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u64),
        Text(String),
    }

    match Option::<RawPort>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawPort::Number(n)) => u16::try_from(n)
            .map(Some)
            .map_err(|_| de::Error::custom(format!("port {} is out of range", n))),
        Some(RawPort::Text(s)) => coerce_port(&s).map_err(de::Error::custom),
    }
}
