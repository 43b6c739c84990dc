//! Field mapping from Horde identities to webmail identity records.

use tracing::warn;

use crate::errors::ImportError;
use crate::models::{IdentityRecord, LegacyIdentity};

/// Derive the Horde user key from a login name: everything before the first
/// `@`, or the whole name when it has none.
pub fn legacy_uid(username: &str) -> Result<&str, ImportError> {
    let uid = username.split('@').next().unwrap_or_default();
    if uid.is_empty() {
        return Err(ImportError::InvalidUsername(username.to_string()));
    }
    Ok(uid)
}

/// Map one Horde identity onto the webmail record fields.
///
/// `reply-to` falls back to the sender address when Horde stored none. A
/// record without a sender address is kept with an empty `email`, as Horde
/// leaves `from_addr` unset on identities that send as the login address.
/// The signature is passed through unchanged.
pub fn map_identity(identity: &LegacyIdentity) -> IdentityRecord {
    let email = identity.from_addr.as_deref().unwrap_or_default();
    if email.trim().is_empty() {
        warn!(id = %identity.id, "Horde identity has no from_addr");
    }

    let reply_to = identity
        .replyto_addr
        .as_deref()
        .filter(|addr| !addr.is_empty())
        .unwrap_or(email);

    IdentityRecord {
        name: identity.fullname.clone(),
        email: email.to_string(),
        reply_to: reply_to.to_string(),
        signature: identity.signature.clone(),
    }
}
