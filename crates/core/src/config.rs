//! TOML-based configuration for the identity importer.
//!
//! The legacy database password is never written to the file. It is stored
//! as a `password_env` field naming an environment variable, and resolved at
//! runtime via [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Horde preferences database settings.
    pub legacy: LegacyConfig,

    /// Webmail identity store settings.
    #[serde(default)]
    pub webmail: WebmailConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Legacy database
// ---------------------------------------------------------------------------

/// Connection parameters for the Horde preferences database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyConfig {
    /// PDO-style DSN, e.g. `pgsql:host=db.example.com;dbname=horde`.
    pub dsn: String,

    /// Database user.
    #[serde(default)]
    pub user: String,

    /// Environment variable holding the database password.
    #[serde(default)]
    pub password_env: Option<String>,

    /// Preferences table. Default `horde_prefs`.
    #[serde(default = "default_prefs_table")]
    pub prefs_table: String,

    /// Preference holding the serialized identity list. Default `identities`.
    #[serde(default = "default_pref_name")]
    pub pref_name: String,

    /// Resolved password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub password: Option<String>,
}

fn default_prefs_table() -> String {
    "horde_prefs".into()
}
fn default_pref_name() -> String {
    "identities".into()
}

// ---------------------------------------------------------------------------
// Webmail store
// ---------------------------------------------------------------------------

/// Location of the webmail identity database used by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebmailConfig {
    /// Path to the SQLite webmail database.
    #[serde(default = "default_webmail_database")]
    pub database: PathBuf,
}

fn default_webmail_database() -> PathBuf {
    PathBuf::from("/var/lib/webmail/webmail.db")
}

impl Default for WebmailConfig {
    fn default() -> Self {
        Self {
            database: default_webmail_database(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `password_env` into `legacy.password`.
    ///
    /// A missing variable logs a warning but does not fail; SQLite sources
    /// need no password at all.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref env_name) = self.legacy.password_env {
            self.legacy.password = resolve_optional_env(env_name, "legacy.password_env");
        }
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.legacy.dsn.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "legacy.dsn".into(),
                detail: "DSN must not be empty".into(),
            });
        }
        if !self.legacy.dsn.contains(':') {
            return Err(ConfigError::InvalidValue {
                field: "legacy.dsn".into(),
                detail: "DSN must start with a driver prefix such as 'sqlite:'".into(),
            });
        }
        if !is_sql_identifier(&self.legacy.prefs_table) {
            return Err(ConfigError::InvalidValue {
                field: "legacy.prefs_table".into(),
                detail: "table name may only contain letters, digits and '_'".into(),
            });
        }
        if self.legacy.pref_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "legacy.pref_name".into(),
                detail: "preference name must not be empty".into(),
            });
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// A commented sample configuration, as written by `init`.
    pub fn sample_toml() -> &'static str {
        r#"# Horde identity import configuration

[legacy]
# PDO-style DSN of the Horde database: sqlite, pgsql or mysql, e.g.
#   dsn = "pgsql:host=db.example.com;dbname=horde"
#   dsn = "mysql:host=db.example.com;port=3306;dbname=horde"
dsn = "sqlite:/var/lib/horde/horde.db"
user = "horde"
# Name of the environment variable holding the database password.
password_env = "HORDE_DB_PASSWORD"
prefs_table = "horde_prefs"
pref_name = "identities"

[webmail]
database = "/var/lib/webmail/webmail.db"

[logging]
level = "info"
"#
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

/// The table name is interpolated into SQL, so keep it to a plain identifier.
fn is_sql_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}
