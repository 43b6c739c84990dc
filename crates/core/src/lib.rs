//! Horde identity import core library.
//!
//! Migrates a user's Horde identities into a webmail identity store the first
//! time they log in: configuration, the legacy preference reader and its PHP
//! `serialize()` decoder, default selection and field mapping, the identity
//! store seam with a SQLite implementation, the importer and the login hook.

pub mod config;
pub mod db;
pub mod errors;
pub mod hook;
pub mod identity;
pub mod importer;
pub mod legacy;
pub mod models;
pub mod store;

// Re-exports for convenience.
pub use config::AppConfig;
pub use db::WebmailDb;
pub use hook::{ImportHook, LoginEvent, LoginHook, LoginHooks};
pub use importer::{IdentityImporter, ImportPlan};
pub use store::IdentityStore;
