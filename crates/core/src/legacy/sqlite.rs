//! SQLite-backed Horde preferences reader.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use super::LegacyPrefs;
use crate::errors::LegacyError;

/// Read-only handle on a Horde preferences table.
pub struct SqlitePrefs {
    conn: Connection,
    query: String,
}

impl SqlitePrefs {
    /// Open `path` read-only and check that `table` exists.
    ///
    /// A missing file, an unreadable file or a missing table are all reported
    /// as [`LegacyError::ConnectionFailed`].
    pub fn open(path: &str, table: &str) -> Result<Self, LegacyError> {
        info!(path, "opening legacy sqlite database");

        if path != ":memory:" && !Path::new(path).exists() {
            return Err(LegacyError::ConnectionFailed(format!(
                "database file '{}' does not exist",
                path
            )));
        }

        let opened = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        };
        let conn = opened.map_err(|e| LegacyError::ConnectionFailed(e.to_string()))?;

        conn.execute_batch("PRAGMA busy_timeout = 5000;")
            .map_err(|e| LegacyError::ConnectionFailed(e.to_string()))?;

        Self::from_connection(conn, table)
    }

    /// Wrap an already-open connection.
    pub fn from_connection(conn: Connection, table: &str) -> Result<Self, LegacyError> {
        let exists = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| LegacyError::ConnectionFailed(e.to_string()))?
            .is_some();
        if !exists {
            return Err(LegacyError::ConnectionFailed(format!(
                "preferences table '{}' not found",
                table
            )));
        }

        let query = format!(
            "SELECT pref_value FROM {} WHERE pref_uid = ?1 AND pref_name = ?2 LIMIT 1",
            table
        );
        Ok(Self { conn, query })
    }
}

impl LegacyPrefs for SqlitePrefs {
    fn fetch_pref(&mut self, uid: &str, pref_name: &str) -> Result<Option<Vec<u8>>, LegacyError> {
        let mut stmt = self
            .conn
            .prepare(&self.query)
            .map_err(|e| LegacyError::QueryFailed(e.to_string()))?;
        // Horde keeps pref_value as TEXT in older schemas and BLOB in newer ones.
        let value = stmt
            .query_row(params![uid, pref_name], |row| {
                Ok(match row.get_ref(0)? {
                    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(bytes.to_vec()),
                    _ => None,
                })
            })
            .optional()
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
