//! The webmail identity store, kept in SQLite.
//!
//! [`WebmailDb`] owns the `users` and `identities` tables the login hook
//! writes into. [`WebmailDb::user_identities`] hands out the per-user
//! [`UserIdentities`] view that the importer sees as an
//! [`IdentityStore`](crate::store::IdentityStore).

pub mod queries;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::errors::DatabaseError;

pub use queries::UserIdentities;

/// Handle on the webmail database. Shared between logins, so the
/// connection sits behind a mutex.
pub struct WebmailDb {
    conn: Mutex<Connection>,
}

impl WebmailDb {
    /// Open (or create) the webmail database file in WAL mode.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening webmail database");

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        Self::with_connection(conn)
    }

    /// Throwaway store for tests and dry runs.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        // Identities are deleted with their user.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create or upgrade the `users` and `identities` tables.
    pub fn initialize(&self) -> Result<(), DatabaseError> {
        schema::run_migrations(&self.conn())
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("webmail database mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run `f` in a transaction; an `Err` rolls everything back.
    pub(crate) fn transaction<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}
