//! MySQL-backed Horde preferences reader (`mysql:` DSNs).

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder};
use tracing::{debug, info};

use super::{Dsn, LegacyPrefs, CONNECT_TIMEOUT};
use crate::errors::LegacyError;

/// Connection options for a `mysql:` DSN.
///
/// Reads `host`, `port`, `dbname` and `unix_socket`, as PDO does.
pub fn mysql_opts(
    dsn: &Dsn,
    user: Option<&str>,
    password: Option<&str>,
) -> Result<Opts, LegacyError> {
    let mut builder = OptsBuilder::new()
        .ip_or_hostname(Some(dsn.param("host").unwrap_or("localhost")))
        .db_name(dsn.param("dbname"))
        .user(user)
        .pass(password)
        .socket(dsn.param("unix_socket"))
        .tcp_connect_timeout(Some(CONNECT_TIMEOUT));

    if let Some(port) = dsn.port()? {
        builder = builder.tcp_port(port);
    }
    Ok(builder.into())
}

/// Client connection to a Horde MySQL database.
pub struct MysqlPrefs {
    conn: Conn,
    query: String,
}

impl MysqlPrefs {
    /// Connect and authenticate. Any failure, including a rejected password,
    /// is a [`LegacyError::ConnectionFailed`].
    pub fn connect(opts: Opts, table: &str) -> Result<Self, LegacyError> {
        info!(dbname = ?opts.get_db_name(), "connecting to legacy mysql database");
        let conn = Conn::new(opts).map_err(|e| LegacyError::ConnectionFailed(e.to_string()))?;

        let query = format!(
            "SELECT pref_value FROM {} WHERE pref_uid = ? AND pref_name = ? LIMIT 1",
            table
        );
        Ok(Self { conn, query })
    }
}

impl LegacyPrefs for MysqlPrefs {
    fn fetch_pref(&mut self, uid: &str, pref_name: &str) -> Result<Option<Vec<u8>>, LegacyError> {
        // TEXT and BLOB columns both arrive as raw bytes.
        let value = self
            .conn
            .exec_first::<Option<Vec<u8>>, _, _>(self.query.as_str(), (uid, pref_name))
            .map_err(|e| LegacyError::QueryFailed(e.to_string()))?
            .flatten();

        debug!(
            uid,
            pref_name,
            found = value.is_some(),
            "looked up legacy preference"
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opts_from_dsn_and_credentials() {
        let dsn: Dsn = "mysql:host=db.example.com;port=3307;dbname=horde"
            .parse()
            .unwrap();
        let opts = mysql_opts(&dsn, Some("horde"), Some("secret")).unwrap();

        assert_eq!(opts.get_tcp_port(), 3307);
        assert_eq!(opts.get_db_name(), Some("horde"));
        assert_eq!(opts.get_user(), Some("horde"));
        assert_eq!(opts.get_pass(), Some("secret"));
        assert_eq!(opts.get_socket(), None);
        assert_eq!(opts.get_tcp_connect_timeout(), Some(CONNECT_TIMEOUT));
    }

    #[test]
    fn test_opts_unix_socket() {
        let dsn: Dsn = "mysql:unix_socket=/run/mysqld/mysqld.sock;dbname=horde"
            .parse()
            .unwrap();
        let opts = mysql_opts(&dsn, None, None).unwrap();

        assert_eq!(opts.get_socket(), Some("/run/mysqld/mysqld.sock"));
        assert_eq!(opts.get_tcp_port(), 3306);
        assert_eq!(opts.get_user(), None);
    }

    #[test]
    fn test_unreachable_server_is_connection_failure() {
        let dsn: Dsn = "mysql:host=127.0.0.1;port=1;dbname=horde".parse().unwrap();
        let opts = mysql_opts(&dsn, Some("horde"), Some("wrong")).unwrap();
        assert!(matches!(
            MysqlPrefs::connect(opts, "horde_prefs"),
            Err(LegacyError::ConnectionFailed(_))
        ));
    }
}
