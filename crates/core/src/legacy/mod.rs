//! Read access to the legacy Horde preferences database.
//!
//! A [`LegacyConnector`] opens a short-lived [`LegacyPrefs`] handle for one
//! import call. The handle is dropped, and the connection closed, when the
//! call returns on any path.

pub mod blob;
pub mod dsn;
pub mod mysql;
pub mod php;
pub mod postgres;
pub mod sqlite;

use std::time::Duration;

use tracing::debug;

use crate::config::LegacyConfig;
use crate::errors::LegacyError;

pub use blob::decode_identities;
pub use dsn::Dsn;
pub use self::mysql::MysqlPrefs;
pub use self::postgres::PgPrefs;
pub use sqlite::SqlitePrefs;

/// Upper bound on establishing a network connection to Horde.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// An open connection that can answer preference lookups.
pub trait LegacyPrefs {
    /// Fetch the raw value of `pref_name` for `uid`, or `None` when the user
    /// has no such preference.
    fn fetch_pref(&mut self, uid: &str, pref_name: &str) -> Result<Option<Vec<u8>>, LegacyError>;
}

/// Opens connections to the legacy database.
pub trait LegacyConnector {
    fn connect(&self) -> Result<Box<dyn LegacyPrefs>, LegacyError>;
}

/// Connector built from the `[legacy]` configuration section.
///
/// The DSN is parsed at connect time so that a malformed DSN surfaces as a
/// connection failure of the import, not as a startup error of the host.
#[derive(Debug, Clone)]
pub struct HordeConnector {
    dsn: String,
    user: String,
    password: Option<String>,
    prefs_table: String,
}

impl HordeConnector {
    pub fn new(config: &LegacyConfig) -> Self {
        Self {
            dsn: config.dsn.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            prefs_table: config.prefs_table.clone(),
        }
    }

    /// Configured credentials, falling back to `user=` / `password=` in the
    /// DSN the way PDO accepts them.
    fn credentials<'a>(&'a self, dsn: &'a Dsn) -> (Option<&'a str>, Option<&'a str>) {
        let user = Some(self.user.as_str())
            .filter(|u| !u.is_empty())
            .or_else(|| dsn.param("user"));
        let password = self.password.as_deref().or_else(|| dsn.param("password"));
        (user, password)
    }
}

impl LegacyConnector for HordeConnector {
    fn connect(&self) -> Result<Box<dyn LegacyPrefs>, LegacyError> {
        let dsn: Dsn = self.dsn.parse()?;
        debug!(driver = dsn.driver(), user = %self.user, "connecting to legacy database");

        let (user, password) = self.credentials(&dsn);
        match &dsn {
            Dsn::Sqlite { path } => {
                if user.is_some() || password.is_some() {
                    debug!("sqlite driver ignores legacy user and password");
                }
                Ok(Box::new(SqlitePrefs::open(path, &self.prefs_table)?))
            }
            Dsn::Server { driver, .. } => match driver.as_str() {
                "pgsql" | "postgres" | "postgresql" => {
                    let config = self::postgres::pg_config(&dsn, user, password)?;
                    Ok(Box::new(PgPrefs::connect(&config, &self.prefs_table)?))
                }
                "mysql" | "mariadb" => {
                    let opts = self::mysql::mysql_opts(&dsn, user, password)?;
                    Ok(Box::new(MysqlPrefs::connect(opts, &self.prefs_table)?))
                }
                _ => Err(LegacyError::UnsupportedDriver(driver.clone())),
            },
        }
    }
}
