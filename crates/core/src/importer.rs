//! The Horde identity importer.
//!
//! An import runs once per login:
//!
//! 1. If the user already has more than one webmail identity, stop.
//! 2. Connect to Horde and fetch the `identities` preference of the user key
//!    (the login name up to the first `@`).
//! 3. Decode it, pick the default record and map every record.
//! 4. Update the user's existing default identity, then insert the rest.
//!
//! Nothing is written unless the whole blob decoded cleanly. Inserts
//! after the default update are best-effort: a failed insert is logged and
//! counted, and the import still succeeds.
//!
//! Two logins of the same user racing through step 1 can both import. This
//! is not guarded against.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::LegacyConfig;
use crate::errors::ImportError;
use crate::identity::{legacy_uid, map_identity, select_default, SelectedBy};
use crate::legacy::{decode_identities, HordeConnector, LegacyConnector};
use crate::models::{IdentityRecord, ImportOutcome, LegacyIdentity};
use crate::store::IdentityStore;

/// Mapped records ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportPlan {
    /// Horde user key the records were read for.
    pub uid: String,
    pub selected_by: SelectedBy,
    /// Replaces the fields of the user's existing default identity.
    pub default: IdentityRecord,
    /// Inserted as new identities, in this order.
    pub additional: Vec<IdentityRecord>,
}

impl ImportPlan {
    /// Select the default record and map every identity.
    ///
    /// Returns `None` for an empty identity set.
    pub fn build(uid: &str, identities: &[LegacyIdentity]) -> Option<Self> {
        let selection = select_default(identities)?;

        Some(Self {
            uid: uid.to_string(),
            selected_by: selection.selected_by,
            default: map_identity(&selection.default),
            additional: selection.remaining.iter().map(map_identity).collect(),
        })
    }
}

/// Imports Horde identities into a webmail identity store.
pub struct IdentityImporter {
    connector: Box<dyn LegacyConnector>,
    pref_name: String,
}

impl IdentityImporter {
    pub fn new(connector: Box<dyn LegacyConnector>, pref_name: impl Into<String>) -> Self {
        Self {
            connector,
            pref_name: pref_name.into(),
        }
    }

    /// Build an importer reading from the configured Horde database.
    pub fn from_config(config: &LegacyConfig) -> Self {
        Self::new(Box::new(HordeConnector::new(config)), config.pref_name.clone())
    }

    /// Run the import for `username` against `store`.
    pub fn import(
        &self,
        username: &str,
        store: &mut dyn IdentityStore,
    ) -> Result<ImportOutcome, ImportError> {
        let existing = store.list_identities()?;
        if existing.len() > 1 {
            debug!(
                username,
                existing = existing.len(),
                "user already has extra identities, skipping import"
            );
            return Ok(ImportOutcome::Skipped {
                existing: existing.len(),
            });
        }
        let target = existing.first().ok_or(ImportError::NoDefaultIdentity)?;

        let uid = legacy_uid(username)?;
        let Some(plan) = self.plan(uid)? else {
            info!(uid, "no Horde identities to import");
            return Ok(ImportOutcome::NoLegacyData);
        };

        store.update_identity(target.identity_id, &plan.default)?;

        let mut inserted = 0;
        let mut failed = 0;
        for record in &plan.additional {
            match store.insert_identity(record) {
                Ok(_) => inserted += 1,
                Err(e) => {
                    warn!(uid, email = %record.email, error = %e, "failed to insert identity");
                    failed += 1;
                }
            }
        }

        info!(
            uid,
            count = inserted,
            failed,
            "Imported {} Horde identities for {}",
            inserted,
            uid
        );
        Ok(ImportOutcome::Imported {
            updated_id: target.identity_id,
            inserted,
            failed,
        })
    }

    /// Fetch, decode and map the Horde identities of `uid` without writing.
    pub fn plan(&self, uid: &str) -> Result<Option<ImportPlan>, ImportError> {
        let identities = self.fetch(uid)?;
        Ok(ImportPlan::build(uid, &identities))
    }

    /// Fetch and decode the Horde identities of `uid`.
    ///
    /// The connection is closed before this returns.
    pub fn fetch(&self, uid: &str) -> Result<Vec<LegacyIdentity>, ImportError> {
        let mut prefs = self.connector.connect()?;
        let Some(raw) = prefs.fetch_pref(uid, &self.pref_name)? else {
            debug!(uid, pref_name = %self.pref_name, "no Horde preference row");
            return Ok(Vec::new());
        };
        Ok(decode_identities(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::errors::{DatabaseError, LegacyError};
    use crate::legacy::LegacyPrefs;
    use crate::models::WebmailIdentity;

    // -- fakes --------------------------------------------------------------

    #[derive(Default)]
    struct Counters {
        connects: Cell<usize>,
        queries: Cell<usize>,
        open: Cell<usize>,
    }

    struct FakeConnector {
        blob: Option<Vec<u8>>,
        fail: bool,
        counters: Rc<Counters>,
    }

    struct FakePrefs {
        blob: Option<Vec<u8>>,
        counters: Rc<Counters>,
    }

    impl Drop for FakePrefs {
        fn drop(&mut self) {
            self.counters.open.set(self.counters.open.get() - 1);
        }
    }

    impl LegacyPrefs for FakePrefs {
        fn fetch_pref(
            &mut self,
            uid: &str,
            pref_name: &str,
        ) -> Result<Option<Vec<u8>>, LegacyError> {
            assert_eq!(uid, "jdoe");
            assert_eq!(pref_name, "identities");
            self.counters.queries.set(self.counters.queries.get() + 1);
            Ok(self.blob.clone())
        }
    }

    impl LegacyConnector for FakeConnector {
        fn connect(&self) -> Result<Box<dyn LegacyPrefs>, LegacyError> {
            self.counters.connects.set(self.counters.connects.get() + 1);
            if self.fail {
                return Err(LegacyError::ConnectionFailed("refused".into()));
            }
            self.counters.open.set(self.counters.open.get() + 1);
            Ok(Box::new(FakePrefs {
                blob: self.blob.clone(),
                counters: self.counters.clone(),
            }))
        }
    }

    fn importer(blob: Option<&str>, fail: bool) -> (IdentityImporter, Rc<Counters>) {
        let counters = Rc::new(Counters::default());
        let connector = FakeConnector {
            blob: blob.map(|b| b.as_bytes().to_vec()),
            fail,
            counters: counters.clone(),
        };
        (IdentityImporter::new(Box::new(connector), "identities"), counters)
    }

    #[derive(Default)]
    struct MemoryStore {
        identities: Vec<WebmailIdentity>,
        updates: Vec<(i64, IdentityRecord)>,
        inserts: Vec<IdentityRecord>,
        reject_insert_email: Option<String>,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl MemoryStore {
        fn with_identities(count: usize) -> Self {
            let identities = (0..count)
                .map(|i| WebmailIdentity {
                    identity_id: 10 + i as i64,
                    standard: i == 0,
                    record: IdentityRecord {
                        email: "jdoe@example.com".into(),
                        ..Default::default()
                    },
                })
                .collect();
            Self {
                identities,
                ..Default::default()
            }
        }
    }

    impl IdentityStore for MemoryStore {
        fn list_identities(&mut self) -> Result<Vec<WebmailIdentity>, DatabaseError> {
            self.log.borrow_mut().push("list");
            Ok(self.identities.clone())
        }

        fn update_identity(
            &mut self,
            identity_id: i64,
            record: &IdentityRecord,
        ) -> Result<(), DatabaseError> {
            self.log.borrow_mut().push("update");
            self.updates.push((identity_id, record.clone()));
            Ok(())
        }

        fn insert_identity(&mut self, record: &IdentityRecord) -> Result<i64, DatabaseError> {
            self.log.borrow_mut().push("insert");
            if self.reject_insert_email.as_deref() == Some(record.email.as_str()) {
                return Err(DatabaseError::NotFound {
                    entity: "identity".into(),
                    id: record.email.clone(),
                });
            }
            self.inserts.push(record.clone());
            Ok(100 + self.inserts.len() as i64)
        }
    }

    const EXAMPLE_BLOB: &str = concat!(
        "a:2:{",
        "i:0;a:6:{s:2:\"id\";s:1:\"1\";s:16:\"default_identity\";b:0;",
        "s:8:\"fullname\";s:3:\"A B\";s:9:\"from_addr\";s:7:\"a@x.com\";",
        "s:12:\"replyto_addr\";s:0:\"\";s:9:\"signature\";s:2:\"S1\";}",
        "i:1;a:6:{s:2:\"id\";s:7:\"Default\";s:16:\"default_identity\";b:0;",
        "s:8:\"fullname\";s:3:\"C D\";s:9:\"from_addr\";s:7:\"c@x.com\";",
        "s:12:\"replyto_addr\";s:7:\"r@x.com\";s:9:\"signature\";s:2:\"S2\";}",
        "}"
    );

    // -- tests --------------------------------------------------------------

    #[test]
    fn test_imports_example_set() {
        let (importer, counters) = importer(Some(EXAMPLE_BLOB), false);
        let mut store = MemoryStore::with_identities(1);

        let outcome = importer.import("jdoe@example.com", &mut store).unwrap();

        assert_eq!(
            outcome,
            ImportOutcome::Imported {
                updated_id: 10,
                inserted: 1,
                failed: 0
            }
        );
        assert_eq!(
            store.updates,
            vec![(
                10,
                IdentityRecord {
                    name: "C D".into(),
                    email: "c@x.com".into(),
                    reply_to: "r@x.com".into(),
                    signature: "S2".into(),
                }
            )]
        );
        assert_eq!(
            store.inserts,
            vec![IdentityRecord {
                name: "A B".into(),
                email: "a@x.com".into(),
                reply_to: "a@x.com".into(),
                signature: "S1".into(),
            }]
        );
        assert_eq!(counters.connects.get(), 1);
        assert_eq!(counters.queries.get(), 1);
        assert_eq!(counters.open.get(), 0, "connection must be released");
    }

    #[test]
    fn test_update_happens_before_inserts() {
        let (importer, _) = importer(Some(EXAMPLE_BLOB), false);
        let mut store = MemoryStore::with_identities(1);
        importer.import("jdoe", &mut store).unwrap();
        assert_eq!(*store.log.borrow(), vec!["list", "update", "insert"]);
    }

    #[test]
    fn test_skips_when_user_has_extra_identities() {
        let (importer, counters) = importer(Some(EXAMPLE_BLOB), false);
        let mut store = MemoryStore::with_identities(2);

        let outcome = importer.import("jdoe@example.com", &mut store).unwrap();

        assert_eq!(outcome, ImportOutcome::Skipped { existing: 2 });
        assert_eq!(counters.connects.get(), 0);
        assert_eq!(counters.queries.get(), 0);
        assert!(store.updates.is_empty());
        assert!(store.inserts.is_empty());
    }

    #[test]
    fn test_connection_failure_writes_nothing() {
        let (importer, counters) = importer(Some(EXAMPLE_BLOB), true);
        let mut store = MemoryStore::with_identities(1);

        let result = importer.import("jdoe@example.com", &mut store);

        assert!(matches!(
            result,
            Err(ImportError::Legacy(LegacyError::ConnectionFailed(_)))
        ));
        assert_eq!(counters.queries.get(), 0);
        assert!(store.updates.is_empty());
        assert!(store.inserts.is_empty());
    }

    #[test]
    fn test_missing_row_is_a_no_op() {
        let (importer, counters) = importer(None, false);
        let mut store = MemoryStore::with_identities(1);

        let outcome = importer.import("jdoe@example.com", &mut store).unwrap();

        assert_eq!(outcome, ImportOutcome::NoLegacyData);
        assert!(store.updates.is_empty());
        assert_eq!(counters.open.get(), 0);
    }

    #[test]
    fn test_empty_set_is_a_no_op() {
        let (importer, _) = importer(Some("a:0:{}"), false);
        let mut store = MemoryStore::with_identities(1);
        assert_eq!(
            importer.import("jdoe", &mut store).unwrap(),
            ImportOutcome::NoLegacyData
        );
        assert!(store.updates.is_empty());
    }

    #[test]
    fn test_malformed_blob_writes_nothing() {
        let (importer, counters) = importer(Some("a:2:{i:0;"), false);
        let mut store = MemoryStore::with_identities(1);

        let result = importer.import("jdoe", &mut store);

        assert!(matches!(result, Err(ImportError::Decode(_))));
        assert!(store.updates.is_empty());
        assert_eq!(counters.open.get(), 0);
    }

    #[test]
    fn test_default_without_address_still_imports_others() {
        let blob = r#"[
            {"id": "Default", "default_identity": 1, "fullname": "J D", "from_addr": ""},
            {"id": "work", "from_addr": "w@work.com"}
        ]"#;
        let (importer, _) = importer(Some(blob), false);
        let mut store = MemoryStore::with_identities(1);

        let outcome = importer.import("jdoe", &mut store).unwrap();

        assert_eq!(
            outcome,
            ImportOutcome::Imported {
                updated_id: 10,
                inserted: 1,
                failed: 0
            }
        );
        assert_eq!(store.updates[0].1.name, "J D");
        assert_eq!(store.updates[0].1.email, "");
        assert_eq!(store.inserts.len(), 1);
        assert_eq!(store.inserts[0].email, "w@work.com");
    }

    #[test]
    fn test_failed_insert_is_counted_not_fatal() {
        let blob = r#"[
            {"id": "Default", "from_addr": "d@x.com"},
            {"id": "a", "from_addr": "bad@x.com"},
            {"id": "b", "from_addr": "b@x.com"}
        ]"#;
        let (importer, _) = importer(Some(blob), false);
        let mut store = MemoryStore {
            reject_insert_email: Some("bad@x.com".into()),
            ..MemoryStore::with_identities(1)
        };

        let outcome = importer.import("jdoe", &mut store).unwrap();

        assert_eq!(
            outcome,
            ImportOutcome::Imported {
                updated_id: 10,
                inserted: 1,
                failed: 1
            }
        );
        assert_eq!(store.inserts[0].email, "b@x.com");
    }

    #[test]
    fn test_user_without_identity_fails_before_connecting() {
        let (importer, counters) = importer(Some(EXAMPLE_BLOB), false);
        let mut store = MemoryStore::default();

        assert!(matches!(
            importer.import("jdoe", &mut store),
            Err(ImportError::NoDefaultIdentity)
        ));
        assert_eq!(counters.connects.get(), 0);
    }

    #[test]
    fn test_invalid_username() {
        let (importer, counters) = importer(Some(EXAMPLE_BLOB), false);
        let mut store = MemoryStore::with_identities(1);
        assert!(matches!(
            importer.import("@example.com", &mut store),
            Err(ImportError::InvalidUsername(_))
        ));
        assert_eq!(counters.connects.get(), 0);
    }

    #[test]
    fn test_plan_without_writes() {
        let (importer, _) = importer(Some(EXAMPLE_BLOB), false);
        let plan = importer.plan("jdoe").unwrap().unwrap();
        assert_eq!(plan.uid, "jdoe");
        assert_eq!(plan.selected_by, SelectedBy::DefaultId);
        assert_eq!(plan.default.email, "c@x.com");
        assert_eq!(plan.additional.len(), 1);
    }
}
