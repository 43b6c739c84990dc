//! PDO-style DSN parsing.
//!
//! Accepted shapes:
//!
//! ```text
//! sqlite:/var/lib/horde/horde.db
//! pgsql:host=db.example.com;port=5432;dbname=horde
//! mysql:host=db.example.com;dbname=horde
//! ```

use std::str::FromStr;

use crate::errors::LegacyError;

/// A parsed legacy database DSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dsn {
    /// A SQLite database file (or `:memory:`).
    Sqlite { path: String },
    /// A network database, described by `key=value` parameters.
    Server {
        driver: String,
        params: Vec<(String, String)>,
    },
}

impl Dsn {
    /// Lowercase driver name, e.g. `sqlite` or `pgsql`.
    pub fn driver(&self) -> &str {
        match self {
            Self::Sqlite { .. } => "sqlite",
            Self::Server { driver, .. } => driver,
        }
    }

    /// Look up a `key=value` parameter of a server DSN.
    pub fn param(&self, key: &str) -> Option<&str> {
        match self {
            Self::Sqlite { .. } => None,
            Self::Server { params, .. } => params
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str()),
        }
    }

    /// The `port` parameter, if present.
    pub fn port(&self) -> Result<Option<u16>, LegacyError> {
        let Some(raw) = self.param("port") else {
            return Ok(None);
        };
        raw.parse().map(Some).map_err(|_| LegacyError::InvalidDsn {
            dsn: format!("{}:...", self.driver()),
            detail: format!("port '{}' is not a valid TCP port", raw),
        })
    }
}

impl FromStr for Dsn {
    type Err = LegacyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |detail: &str| LegacyError::InvalidDsn {
            dsn: s.to_string(),
            detail: detail.to_string(),
        };

        let (driver, body) = s.trim().split_once(':').ok_or_else(|| invalid("missing driver prefix"))?;
        if driver.is_empty() || !driver.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("driver must be alphanumeric"));
        }
        let driver = driver.to_ascii_lowercase();

        if driver == "sqlite" {
            if body.is_empty() {
                return Err(invalid("sqlite DSN needs a file path"));
            }
            return Ok(Self::Sqlite {
                path: body.to_string(),
            });
        }

        let mut params = Vec::new();
        for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid("expected key=value pairs"))?;
            params.push((key.trim().to_string(), value.trim().to_string()));
        }

        Ok(Self::Server { driver, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sqlite() {
        let dsn: Dsn = "sqlite:/var/lib/horde/horde.db".parse().unwrap();
        assert_eq!(
            dsn,
            Dsn::Sqlite {
                path: "/var/lib/horde/horde.db".into()
            }
        );
        assert_eq!(dsn.driver(), "sqlite");
    }

    #[test]
    fn test_parse_sqlite_memory() {
        let dsn: Dsn = "sqlite::memory:".parse().unwrap();
        assert_eq!(dsn, Dsn::Sqlite { path: ":memory:".into() });
    }

    #[test]
    fn test_parse_server_params() {
        let dsn: Dsn = "PGSQL:host=db.example.com; dbname=horde;".parse().unwrap();
        assert_eq!(dsn.driver(), "pgsql");
        assert_eq!(dsn.param("host"), Some("db.example.com"));
        assert_eq!(dsn.param("DBNAME"), Some("horde"));
        assert_eq!(dsn.param("port"), None);
    }

    #[test]
    fn test_port_param() {
        let dsn: Dsn = "mysql:host=db;port=3307".parse().unwrap();
        assert_eq!(dsn.port().unwrap(), Some(3307));

        let dsn: Dsn = "pgsql:host=db".parse().unwrap();
        assert_eq!(dsn.port().unwrap(), None);

        let dsn: Dsn = "pgsql:host=db;port=99999".parse().unwrap();
        assert!(matches!(dsn.port(), Err(LegacyError::InvalidDsn { .. })));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("horde.db".parse::<Dsn>().is_err());
        assert!(":foo".parse::<Dsn>().is_err());
        assert!("sqlite:".parse::<Dsn>().is_err());
        assert!("mysql:host".parse::<Dsn>().is_err());
    }
}
