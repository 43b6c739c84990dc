//! Picking the Horde identity that becomes the webmail default.

use serde::Serialize;
use tracing::debug;

use crate::models::LegacyIdentity;

/// Which rule picked the default record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectedBy {
    /// The record had `default_identity` set.
    DefaultFlag,
    /// The record had the `"Default"` id.
    DefaultId,
    /// Neither marker was present; the first record was used.
    FirstRecord,
}

/// The default record split out from the rest of the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultSelection {
    pub default: LegacyIdentity,
    pub selected_by: SelectedBy,
    /// Every other record, in the original order.
    pub remaining: Vec<LegacyIdentity>,
}

/// Split `identities` into the default record and the remainder.
///
/// Returns `None` for an empty set. The input is left untouched.
pub fn select_default(identities: &[LegacyIdentity]) -> Option<DefaultSelection> {
    let (index, selected_by) = identities
        .iter()
        .position(|identity| identity.default_identity)
        .map(|i| (i, SelectedBy::DefaultFlag))
        .or_else(|| {
            identities
                .iter()
                .position(LegacyIdentity::is_default_sentinel)
                .map(|i| (i, SelectedBy::DefaultId))
        })
        .or_else(|| (!identities.is_empty()).then_some((0, SelectedBy::FirstRecord)))?;

    debug!(index, ?selected_by, total = identities.len(), "selected default identity");

    let remaining = identities
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, identity)| identity.clone())
        .collect();

    Some(DefaultSelection {
        default: identities[index].clone(),
        selected_by,
        remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str, default_identity: bool) -> LegacyIdentity {
        LegacyIdentity {
            id: id.into(),
            default_identity,
            fullname: format!("User {}", id),
            from_addr: Some(format!("{}@example.com", id.to_lowercase())),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_set_selects_nothing() {
        assert!(select_default(&[]).is_none());
    }

    #[test]
    fn test_default_flag_wins_over_sentinel_id() {
        let set = vec![
            identity("Default", false),
            identity("1", false),
            identity("2", true),
        ];
        let selection = select_default(&set).unwrap();
        assert_eq!(selection.default.id, "2");
        assert_eq!(selection.selected_by, SelectedBy::DefaultFlag);
        let ids: Vec<_> = selection.remaining.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["Default", "1"]);
    }

    #[test]
    fn test_first_flagged_record_is_used() {
        let set = vec![identity("1", true), identity("2", true)];
        let selection = select_default(&set).unwrap();
        assert_eq!(selection.default.id, "1");
        assert_eq!(selection.remaining.len(), 1);
        assert_eq!(selection.remaining[0].id, "2");
    }

    #[test]
    fn test_sentinel_id_used_without_flag() {
        let set = vec![identity("1", false), identity("Default", false)];
        let selection = select_default(&set).unwrap();
        assert_eq!(selection.default.id, "Default");
        assert_eq!(selection.selected_by, SelectedBy::DefaultId);
        assert_eq!(selection.remaining, vec![identity("1", false)]);
    }

    #[test]
    fn test_falls_back_to_first_record() {
        let set = vec![identity("a", false), identity("b", false), identity("c", false)];
        let selection = select_default(&set).unwrap();
        assert_eq!(selection.default.id, "a");
        assert_eq!(selection.selected_by, SelectedBy::FirstRecord);
        let ids: Vec<_> = selection.remaining.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_default_never_in_remaining() {
        let set = vec![identity("x", false), identity("Default", false), identity("y", true)];
        let selection = select_default(&set).unwrap();
        assert!(!selection.remaining.contains(&selection.default));
        assert_eq!(selection.remaining.len(), set.len() - 1);
    }

    #[test]
    fn test_input_unchanged() {
        let set = vec![identity("1", false), identity("2", true)];
        let before = set.clone();
        let _ = select_default(&set);
        assert_eq!(set, before);
    }
}
