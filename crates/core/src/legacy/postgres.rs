//! PostgreSQL-backed Horde preferences reader (`pgsql:` DSNs).

use postgres::types::Type;
use postgres::{Client, Config, NoTls};
use tracing::{debug, info};

use super::{Dsn, LegacyPrefs, CONNECT_TIMEOUT};
use crate::errors::LegacyError;

/// Connection options for a `pgsql:` DSN.
///
/// `host` defaults to `localhost`; `port` and `dbname` are passed through
/// when present. A host starting with `/` names a Unix socket directory.
pub fn pg_config(
    dsn: &Dsn,
    user: Option<&str>,
    password: Option<&str>,
) -> Result<Config, LegacyError> {
    let mut config = Config::new();
    config
        .host(dsn.param("host").unwrap_or("localhost"))
        .connect_timeout(CONNECT_TIMEOUT)
        .application_name("horde-identity-import");

    if let Some(port) = dsn.port()? {
        config.port(port);
    }
    if let Some(dbname) = dsn.param("dbname") {
        config.dbname(dbname);
    }
    if let Some(user) = user {
        config.user(user);
    }
    if let Some(password) = password {
        config.password(password);
    }
    Ok(config)
}

/// Client connection to a Horde PostgreSQL database.
pub struct PgPrefs {
    client: Client,
    query: String,
}

impl PgPrefs {
    /// Connect and authenticate. Any failure, including a rejected password,
    /// is a [`LegacyError::ConnectionFailed`].
    pub fn connect(config: &Config, table: &str) -> Result<Self, LegacyError> {
        info!(
            hosts = ?config.get_hosts(),
            dbname = ?config.get_dbname(),
            "connecting to legacy postgres database"
        );
        let client = config
            .connect(NoTls)
            .map_err(|e| LegacyError::ConnectionFailed(e.to_string()))?;

        let query = format!(
            "SELECT pref_value FROM {} WHERE pref_uid = $1 AND pref_name = $2 LIMIT 1",
            table
        );
        Ok(Self { client, query })
    }
}

impl LegacyPrefs for PgPrefs {
    fn fetch_pref(&mut self, uid: &str, pref_name: &str) -> Result<Option<Vec<u8>>, LegacyError> {
        let query_failed = |e: postgres::Error| LegacyError::QueryFailed(e.to_string());

        let row = self
            .client
            .query_opt(self.query.as_str(), &[&uid, &pref_name])
            .map_err(query_failed)?;

        // Horde 5 declares pref_value as BYTEA, older schemas as TEXT.
        let value = match row {
            None => None,
            Some(row) if *row.columns()[0].type_() == Type::BYTEA => row
                .try_get::<_, Option<Vec<u8>>>(0)
                .map_err(query_failed)?,
            Some(row) => row
                .try_get::<_, Option<String>>(0)
                .map_err(query_failed)?
                .map(String::into_bytes),
        };

        debug!(
            uid,
            pref_name,
            found = value.is_some(),
            "looked up legacy preference"
        );
        Ok(value)
    }
}
