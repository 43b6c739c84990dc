//! Login hooks a webmail host calls after a successful authentication.

use tracing::{info, warn};

use crate::importer::IdentityImporter;
use crate::store::IdentityStore;

/// A successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginEvent {
    pub username: String,
}

impl LoginEvent {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Handler for the host's `login_after` event.
///
/// Returning `false` signals a failure to the host; it must never abort the
/// login itself.
pub trait LoginHook {
    fn name(&self) -> &str;

    fn login_after(&self, event: &LoginEvent, store: &mut dyn IdentityStore) -> bool;
}

/// Runs the Horde identity import on login.
pub struct ImportHook {
    importer: IdentityImporter,
}

impl ImportHook {
    pub fn new(importer: IdentityImporter) -> Self {
        Self { importer }
    }
}

impl LoginHook for ImportHook {
    fn name(&self) -> &str {
        "import_horde_identities"
    }

    fn login_after(&self, event: &LoginEvent, store: &mut dyn IdentityStore) -> bool {
        match self.importer.import(&event.username, store) {
            Ok(outcome) => {
                info!(username = %event.username, %outcome, "identity import finished");
                true
            }
            Err(e) => {
                warn!(username = %event.username, error = %e, "identity import failed");
                false
            }
        }
    }
}

/// The hooks registered for the login event, run in registration order.
#[derive(Default)]
pub struct LoginHooks {
    hooks: Vec<Box<dyn LoginHook>>,
}

impl LoginHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Box<dyn LoginHook>) {
        info!(hook = hook.name(), "registered login hook");
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook. Returns `true` only if all of them succeeded; a
    /// failing hook does not stop the ones after it.
    pub fn dispatch(&self, event: &LoginEvent, store: &mut dyn IdentityStore) -> bool {
        let mut all_ok = true;
        for hook in &self.hooks {
            if !hook.login_after(event, store) {
                warn!(hook = hook.name(), username = %event.username, "login hook reported failure");
                all_ok = false;
            }
        }
        all_ok
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::db::WebmailDb;
    use crate::errors::LegacyError;
    use crate::legacy::{LegacyConnector, LegacyPrefs};

    struct Unreachable;

    impl LegacyConnector for Unreachable {
        fn connect(&self) -> Result<Box<dyn LegacyPrefs>, LegacyError> {
            Err(LegacyError::ConnectionFailed("host unreachable".into()))
        }
    }

    struct Recorder {
        calls: Rc<Cell<usize>>,
    }

    impl LoginHook for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn login_after(&self, _event: &LoginEvent, _store: &mut dyn IdentityStore) -> bool {
            self.calls.set(self.calls.get() + 1);
            true
        }
    }

    fn store_db() -> WebmailDb {
        let db = WebmailDb::in_memory().unwrap();
        db.initialize().unwrap();
        db.create_user("jdoe@example.com", "jdoe@example.com").unwrap();
        db
    }

    #[test]
    fn test_import_hook_reports_failure_without_panicking() {
        let db = store_db();
        let mut store = db.user_identities("jdoe@example.com").unwrap();
        let hook = ImportHook::new(IdentityImporter::new(Box::new(Unreachable), "identities"));

        assert!(!hook.login_after(&LoginEvent::new("jdoe@example.com"), &mut store));
    }

    #[test]
    fn test_dispatch_runs_all_hooks_after_failure() {
        let db = store_db();
        let mut store = db.user_identities("jdoe@example.com").unwrap();
        let calls = Rc::new(Cell::new(0));

        let mut hooks = LoginHooks::new();
        hooks.register(Box::new(ImportHook::new(IdentityImporter::new(
            Box::new(Unreachable),
            "identities",
        ))));
        hooks.register(Box::new(Recorder {
            calls: calls.clone(),
        }));
        assert_eq!(hooks.len(), 2);

        let ok = hooks.dispatch(&LoginEvent::new("jdoe@example.com"), &mut store);

        assert!(!ok);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_empty_registry_succeeds() {
        let db = store_db();
        let mut store = db.user_identities("jdoe@example.com").unwrap();
        let hooks = LoginHooks::new();
        assert!(hooks.is_empty());
        assert!(hooks.dispatch(&LoginEvent::new("jdoe"), &mut store));
    }
}
