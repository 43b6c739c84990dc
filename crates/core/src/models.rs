//! Domain model types shared by the legacy reader, the identity store and
//! the importer.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Legacy (Horde) identity
// ---------------------------------------------------------------------------

/// Identity id Horde gives the profile created with the account.
pub const DEFAULT_IDENTITY_ID: &str = "Default";

/// One entry of a Horde user's `identities` preference.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegacyIdentity {
    /// Horde identity key. `"Default"` marks the account's original profile.
    #[serde(default)]
    pub id: String,
    /// Set on the identity the user picked as default in Horde.
    #[serde(default)]
    pub default_identity: bool,
    #[serde(default)]
    pub fullname: String,
    /// Sender address. Required for mapping.
    #[serde(default)]
    pub from_addr: Option<String>,
    #[serde(default)]
    pub replyto_addr: Option<String>,
    #[serde(default)]
    pub signature: String,
}

impl LegacyIdentity {
    /// Whether this record carries the Horde sentinel default id.
    pub fn is_default_sentinel(&self) -> bool {
        self.id == DEFAULT_IDENTITY_ID
    }
}

// ---------------------------------------------------------------------------
// Webmail identity
// ---------------------------------------------------------------------------

/// The writable fields of a webmail identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityRecord {
    pub name: String,
    pub email: String,
    #[serde(rename = "reply-to")]
    pub reply_to: String,
    pub signature: String,
}

/// An identity as stored by the webmail host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebmailIdentity {
    /// Host-assigned identifier.
    pub identity_id: i64,
    /// Marks the user's standard (default) identity.
    pub standard: bool,
    #[serde(flatten)]
    pub record: IdentityRecord,
}

// ---------------------------------------------------------------------------
// Import outcome
// ---------------------------------------------------------------------------

/// How a successful import call finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ImportOutcome {
    /// The user already had more than one identity; nothing was read.
    Skipped { existing: usize },
    /// Horde had no identities for the user; nothing was written.
    NoLegacyData,
    /// The default identity was updated and the rest inserted.
    Imported {
        updated_id: i64,
        inserted: usize,
        failed: usize,
    },
}

impl ImportOutcome {
    /// Number of identities newly inserted by this call.
    pub fn inserted(&self) -> usize {
        match self {
            Self::Imported { inserted, .. } => *inserted,
            _ => 0,
        }
    }
}

impl std::fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped { existing } => {
                write!(f, "skipped ({} identities already present)", existing)
            }
            Self::NoLegacyData => write!(f, "no Horde identities found"),
            Self::Imported {
                updated_id,
                inserted,
                failed,
            } => {
                write!(
                    f,
                    "updated identity {}, inserted {}",
                    updated_id, inserted
                )?;
                if *failed > 0 {
                    write!(f, ", {} failed", failed)?;
                }
                Ok(())
            }
        }
    }
}
