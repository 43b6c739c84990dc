//! The webmail host's identity store, as seen by the importer.

use crate::errors::DatabaseError;
use crate::models::{IdentityRecord, WebmailIdentity};

/// Per-user identity operations provided by the webmail host.
///
/// Every call is scoped to the user the store was opened for.
pub trait IdentityStore {
    /// The user's identities, default first.
    fn list_identities(&mut self) -> Result<Vec<WebmailIdentity>, DatabaseError>;

    /// Overwrite the fields of an existing identity.
    fn update_identity(&mut self, identity_id: i64, record: &IdentityRecord)
        -> Result<(), DatabaseError>;

    /// Add a new, non-default identity and return its id.
    fn insert_identity(&mut self, record: &IdentityRecord) -> Result<i64, DatabaseError>;
}
