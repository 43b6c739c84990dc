//! Translating Horde identities into webmail identity records.
//!
//! The default record is chosen in this order:
//! 1. The first identity flagged `default_identity`
//! 2. The first identity whose id is `"Default"`
//! 3. The first identity in stored order

pub mod mapper;
pub mod selector;

pub use mapper::{legacy_uid, map_identity};
pub use selector::{select_default, DefaultSelection, SelectedBy};
