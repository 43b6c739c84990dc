//! Typed query helpers for the webmail `users` and `identities` tables.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::WebmailDb;
use crate::errors::DatabaseError;
use crate::models::{IdentityRecord, WebmailIdentity};
use crate::store::IdentityStore;

impl WebmailDb {
    // -- users --------------------------------------------------------------

    /// Look up a user id by login name.
    pub fn find_user(&self, username: &str) -> Result<Option<i64>, DatabaseError> {
        let conn = self.conn();
        let id = conn
            .query_row(
                "SELECT user_id FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Create a user together with its standard identity, as the webmail
    /// host does on first login. Returns the new user id.
    pub fn create_user(&self, username: &str, email: &str) -> Result<i64, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let user_id = self.transaction(|conn| {
            conn.execute(
                "INSERT INTO users (username, created) VALUES (?1, ?2)",
                params![username, now],
            )?;
            let user_id = conn.last_insert_rowid();
            conn.execute(
                "INSERT INTO identities (user_id, changed, standard, name, email)
                 VALUES (?1, ?2, 1, '', ?3)",
                params![user_id, now, email],
            )?;
            Ok(user_id)
        })?;
        info!(user_id, username, "created webmail user");
        Ok(user_id)
    }

    /// Return the existing user id, or create the user.
    pub fn ensure_user(&self, username: &str, email: &str) -> Result<i64, DatabaseError> {
        match self.find_user(username)? {
            Some(id) => Ok(id),
            None => self.create_user(username, email),
        }
    }

    /// Open the identity store of an existing user.
    pub fn user_identities(&self, username: &str) -> Result<UserIdentities<'_>, DatabaseError> {
        let user_id = self
            .find_user(username)?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "user".into(),
                id: username.to_string(),
            })?;
        Ok(UserIdentities { db: self, user_id })
    }
}

// ---------------------------------------------------------------------------
// Per-user identity store
// ---------------------------------------------------------------------------

/// The identities of one webmail user.
pub struct UserIdentities<'a> {
    db: &'a WebmailDb,
    user_id: i64,
}

impl UserIdentities<'_> {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }
}

impl IdentityStore for UserIdentities<'_> {
    fn list_identities(&mut self) -> Result<Vec<WebmailIdentity>, DatabaseError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT identity_id, standard, name, email, \"reply-to\", signature
             FROM identities
             WHERE user_id = ?1 AND del = 0
             ORDER BY standard DESC, name ASC, email ASC, identity_id ASC",
        )?;
        let identities = stmt
            .query_map(params![self.user_id], |row| {
                Ok(WebmailIdentity {
                    identity_id: row.get(0)?,
                    standard: row.get(1)?,
                    record: IdentityRecord {
                        name: row.get(2)?,
                        email: row.get(3)?,
                        reply_to: row.get(4)?,
                        signature: row.get(5)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(identities)
    }

    fn update_identity(
        &mut self,
        identity_id: i64,
        record: &IdentityRecord,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.db.conn();
        let changed = conn.execute(
            "UPDATE identities
             SET name = ?1, email = ?2, \"reply-to\" = ?3, signature = ?4, changed = ?5
             WHERE identity_id = ?6 AND user_id = ?7 AND del = 0",
            params![
                record.name,
                record.email,
                record.reply_to,
                record.signature,
                now,
                identity_id,
                self.user_id
            ],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "identity".into(),
                id: identity_id.to_string(),
            });
        }
        debug!(identity_id, user_id = self.user_id, "updated identity");
        Ok(())
    }

    fn insert_identity(&mut self, record: &IdentityRecord) -> Result<i64, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO identities (user_id, changed, standard, name, email, \"reply-to\", signature)
             VALUES (?1, ?2, 0, ?3, ?4, ?5, ?6)",
            params![
                self.user_id,
                now,
                record.name,
                record.email,
                record.reply_to,
                record.signature
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, user_id = self.user_id, email = %record.email, "inserted identity");
        Ok(id)
    }
}
