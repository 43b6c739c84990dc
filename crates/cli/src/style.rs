//! Terminal rendering of import results.

use console::Style;

use horde_identity_import_core::identity::SelectedBy;
use horde_identity_import_core::importer::ImportPlan;
use horde_identity_import_core::models::ImportOutcome;

fn marked(style: Style, mark: &str, msg: &str) -> String {
    format!("{} {}", style.apply_to(mark), msg)
}

/// One line per import: green for a clean import, yellow when nothing was
/// imported or some inserts failed.
pub fn outcome(username: &str, outcome: &ImportOutcome) -> String {
    let line = format!("{}: {}", username, outcome);
    match outcome {
        ImportOutcome::Imported { failed: 0, .. } => marked(Style::new().green(), "✓", &line),
        _ => marked(Style::new().yellow(), "⚠", &line),
    }
}

/// Result of `provision`; an existing user is not an error.
pub fn provisioned(username: &str, user_id: i64, existed: bool) -> String {
    if existed {
        marked(
            Style::new().yellow(),
            "⚠",
            &format!("user '{}' already exists (id {})", username, user_id),
        )
    } else {
        marked(
            Style::new().green(),
            "✓",
            &format!("created user '{}' (id {})", username, user_id),
        )
    }
}

/// Top-level failure of a subcommand, with its context chain.
pub fn failure(err: &anyhow::Error) -> String {
    marked(Style::new().red(), "✗", &format!("{:#}", err))
}

/// Bold title plus a dim line saying how the default record was picked.
pub fn plan_heading(plan: &ImportPlan) -> String {
    let reason = match plan.selected_by {
        SelectedBy::DefaultFlag => "default chosen by its default_identity flag",
        SelectedBy::DefaultId => "default chosen by its \"Default\" id",
        SelectedBy::FirstRecord => "no default marked, first record used",
    };
    format!(
        "{}\n{}",
        Style::new()
            .bold()
            .apply_to(format!("Horde identities for {}", plan.uid)),
        Style::new().dim().apply_to(reason)
    )
}
