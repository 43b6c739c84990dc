//! Horde identity import command-line tool.
//!
//! Runs the same import the webmail login hook performs, previews what an
//! import would write, inspects a user's webmail identities, and generates /
//! validates configuration files.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use tracing::info;
use tracing_subscriber::EnvFilter;

use horde_identity_import_core::config::AppConfig;
use horde_identity_import_core::db::WebmailDb;
use horde_identity_import_core::identity::legacy_uid;
use horde_identity_import_core::importer::{IdentityImporter, ImportPlan};
use horde_identity_import_core::models::IdentityRecord;
use horde_identity_import_core::store::IdentityStore;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Import Horde identities into the webmail identity store.
#[derive(Parser, Debug)]
#[command(
    name = "horde-identity-import",
    version,
    about = "Import a user's Horde identities into the webmail identity store"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short,
        long,
        global = true,
        default_value = "/etc/horde-identity-import/config.toml"
    )]
    config: PathBuf,

    /// Log at debug level regardless of the configured level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the login-time import for a user.
    Import {
        /// Webmail login name, e.g. jdoe@example.com.
        username: String,
    },

    /// Show what an import would write, without touching the webmail store.
    Preview {
        /// Webmail login name.
        username: String,

        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List a user's webmail identities.
    List {
        /// Webmail login name.
        username: String,
    },

    /// Create a webmail user with its default identity, if missing.
    Provision {
        /// Webmail login name.
        username: String,

        /// Address of the default identity (defaults to the username).
        #[arg(long)]
        email: Option<String>,
    },

    /// Generate a sample configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./horde-identity-import.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::failure(&e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        config,
        verbose,
        command,
    } = cli;

    match command {
        Commands::Import { username } => cmd_import(&setup(&config, verbose)?, &username),
        Commands::Preview { username, json } => {
            cmd_preview(&setup(&config, verbose)?, &username, json)
        }
        Commands::List { username } => cmd_list(&setup(&config, verbose)?, &username),
        Commands::Provision { username, email } => {
            cmd_provision(&setup(&config, verbose)?, &username, email.as_deref())
        }
        Commands::Init { output } => {
            init_logging(verbose, "warn");
            cmd_init(&output)
        }
        Commands::Validate => {
            init_logging(verbose, "warn");
            cmd_validate(&config)
        }
    }
}

/// `RUST_LOG` wins over the configured level; `--verbose` wins over both.
fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Load the config and start logging at its configured level.
fn setup(path: &Path, verbose: bool) -> Result<AppConfig> {
    let config = AppConfig::load_and_resolve(path).context("failed to load configuration file")?;
    init_logging(verbose, &config.logging.level);
    Ok(config)
}

fn open_database(config: &AppConfig) -> Result<WebmailDb> {
    let db = WebmailDb::new(&config.webmail.database).context("failed to open webmail database")?;
    db.initialize().context("failed to initialize webmail database")?;
    Ok(db)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_import(config: &AppConfig, username: &str) -> Result<()> {
    let db = open_database(config)?;
    let mut store = db
        .user_identities(username)
        .with_context(|| format!("cannot open identities of '{}'", username))?;

    info!(username, user_id = store.user_id(), "running identity import");
    let importer = IdentityImporter::from_config(&config.legacy);
    let outcome = importer
        .import(username, &mut store)
        .context("identity import failed")?;

    println!("{}", style::outcome(username, &outcome));
    Ok(())
}

fn cmd_preview(config: &AppConfig, username: &str, json: bool) -> Result<()> {
    let uid = legacy_uid(username)?;
    let importer = IdentityImporter::from_config(&config.legacy);
    let plan = importer
        .plan(uid)
        .with_context(|| format!("cannot read Horde identities of '{}'", uid))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let Some(plan) = plan else {
        println!("No Horde identities found for '{}'.", uid);
        return Ok(());
    };

    print_plan(&plan);
    Ok(())
}

fn print_plan(plan: &ImportPlan) {
    println!();
    println!("{}", style::plan_heading(plan));
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Action", "Name", "Email", "Reply-To", "Signature"]);

    table.add_row(record_row(
        Cell::new("update default").fg(Color::Yellow),
        &plan.default,
    ));
    for record in &plan.additional {
        table.add_row(record_row(Cell::new("insert").fg(Color::Green), record));
    }

    println!("{}", table);
    println!();
}

fn record_row(action: Cell, record: &IdentityRecord) -> Vec<Cell> {
    vec![
        action,
        Cell::new(&record.name),
        Cell::new(&record.email),
        Cell::new(&record.reply_to),
        Cell::new(signature_excerpt(&record.signature)),
    ]
}

/// First line of a signature, shortened for table display.
fn signature_excerpt(signature: &str) -> String {
    let first = signature.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if first.chars().count() > 32 {
        format!("{}…", first.chars().take(31).collect::<String>())
    } else {
        first.to_string()
    }
}

fn cmd_list(config: &AppConfig, username: &str) -> Result<()> {
    let db = open_database(config)?;
    let mut store = db
        .user_identities(username)
        .with_context(|| format!("cannot open identities of '{}'", username))?;
    let identities = store
        .list_identities()
        .context("failed to list identities")?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Default", "Name", "Email", "Reply-To"]);

    for identity in &identities {
        table.add_row(vec![
            Cell::new(identity.identity_id),
            Cell::new(if identity.standard { "yes" } else { "" }),
            Cell::new(&identity.record.name),
            Cell::new(&identity.record.email),
            Cell::new(&identity.record.reply_to),
        ]);
    }

    println!("{}", table);
    Ok(())
}

fn cmd_provision(config: &AppConfig, username: &str, email: Option<&str>) -> Result<()> {
    let db = open_database(config)?;
    let email = email.unwrap_or(username);
    let existed = db.find_user(username)?.is_some();
    let user_id = db
        .ensure_user(username, email)
        .context("failed to provision user")?;

    println!("{}", style::provisioned(username, user_id, existed));
    Ok(())
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, AppConfig::sample_toml()).context("failed to write config file")?;

    println!("Sample configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Point [legacy].dsn at the Horde database");
    println!("  2. Set the password environment variable named by password_env");
    println!(
        "  3. Validate with: horde-identity-import validate --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  [OK] Environment variable references processed");

    if let Err(e) = config.validate() {
        println!("  [FAIL] Validation error: {}", e);
        anyhow::bail!("configuration validation failed");
    }
    println!("  [OK] All required fields are valid");

    println!();
    println!("Configuration summary:");
    println!("  Horde DSN      : {}", config.legacy.dsn);
    println!("  Horde user     : {}", config.legacy.user);
    println!(
        "  Horde password : {}",
        if config.legacy.password.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    println!(
        "  Preference     : {}.{}",
        config.legacy.prefs_table, config.legacy.pref_name
    );
    println!("  Webmail DB     : {}", config.webmail.database.display());
    println!("  Log level      : {}", config.logging.level);
    println!();
    println!("Configuration is valid.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_import() {
        let cli = Cli::try_parse_from([
            "horde-identity-import",
            "--config",
            "/tmp/c.toml",
            "import",
            "jdoe@example.com",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/c.toml"));
        assert!(matches!(cli.command, Commands::Import { ref username } if username == "jdoe@example.com"));
    }

    #[test]
    fn test_cli_parses_preview_json() {
        let cli =
            Cli::try_parse_from(["horde-identity-import", "preview", "jdoe", "--json", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Preview { json: true, .. }));
    }

    #[test]
    fn test_signature_excerpt() {
        assert_eq!(signature_excerpt("\n-- \nJane"), "-- ");
        assert_eq!(signature_excerpt(""), "");
        let long = "x".repeat(40);
        assert_eq!(signature_excerpt(&long).chars().count(), 32);
    }

    #[test]
    fn test_commands_needing_config_fail_without_it() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        for command in [
            Commands::Import {
                username: "jdoe".into(),
            },
            Commands::List {
                username: "jdoe".into(),
            },
        ] {
            let err = run(Cli {
                config: missing.clone(),
                verbose: false,
                command,
            })
            .unwrap_err();
            assert!(format!("{:#}", err).contains("failed to load configuration file"));
        }
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        cmd_init(&path).unwrap();
        assert!(AppConfig::load_from_file(&path).is_ok());
        assert!(cmd_init(&path).is_err());
    }
}
