//! OKR CLI - track objectives, key results, and monthly progress from
//! the command line.
//!
//! This is the command-line interface for the OKR tracker. It drives the
//! core library: every command opens the persisted snapshot, performs its
//! operation, and persists again on the way out.

mod config;
mod dashboard;

use std::path::Path;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use dialoguer::Confirm;
use owo_colors::OwoColorize;

use okr_core::export::export_document;
use okr_core::ops::copy_targets_to_months;
use okr_core::snapshot::{export_to_file, import_from_file, DirSnapshotStore};
use okr_core::storage::{
    KeyResultEdit, MonthlyUpdate, NewKeyResult, NewObjective, ObjectiveEdit, OkrStore,
};
use okr_core::window::{current_month, ensure_month};
use okr_core::{Session, VERSION};

/// OKR tracker - objectives, key results, and monthly progress
#[derive(Parser)]
#[command(name = "okr")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding the database snapshot
    #[arg(long, global = true, env = "OKR_DATA_DIR")]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config file and an empty database snapshot
    Init,

    /// Manage objectives
    Objective {
        #[command(subcommand)]
        command: ObjectiveCommands,
    },

    /// Manage key results
    Kr {
        #[command(subcommand)]
        command: KrCommands,
    },

    /// Set a month's target and/or actual for a key result
    Set {
        /// Key result id
        #[arg(value_name = "KR_ID")]
        key_result_id: i64,

        /// Month (YYYY-MM)
        #[arg(value_name = "MONTH")]
        month: String,

        /// Target value
        #[arg(long)]
        target: Option<f64>,

        /// Actual value
        #[arg(long)]
        actual: Option<f64>,
    },

    /// Set the monthly comment on an objective
    Comment {
        /// Objective id
        #[arg(value_name = "OBJECTIVE_ID")]
        objective_id: i64,

        /// Month (YYYY-MM)
        #[arg(value_name = "MONTH")]
        month: String,

        /// Comment text (overwrites any existing comment for the month)
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Show the status/trend dashboard for a month
    Dashboard {
        /// Month to show (defaults to the current month)
        #[arg(long)]
        month: Option<String>,

        /// Output the composite details as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy every key result's target from one month into others
    CopyTargets {
        /// Source month (YYYY-MM)
        #[arg(value_name = "SOURCE")]
        source_month: String,

        /// Destination months (YYYY-MM)
        #[arg(value_name = "MONTH", required = true)]
        target_months: Vec<String>,
    },

    /// Export the database to a file
    Export {
        /// Destination path (defaults to okr-backup-<timestamp>.<ext>)
        #[arg(value_name = "PATH")]
        path: Option<String>,

        /// Output format (db, json)
        #[arg(long, default_value = "db")]
        format: String,
    },

    /// Replace the database with an imported file
    Import {
        /// Source database file
        #[arg(value_name = "PATH")]
        path: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Copy the snapshot file somewhere safe
    Backup {
        /// Destination path
        #[arg(value_name = "DEST")]
        destination: String,
    },

    /// Check database integrity
    Check,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ObjectiveCommands {
    /// Add a new objective
    Add {
        /// Objective title
        #[arg(long)]
        title: String,

        /// Accountable driver
        #[arg(long)]
        driver: String,

        /// Optional description
        #[arg(long)]
        description: Option<String>,
    },

    /// Edit an objective (replaces title/description/driver)
    Edit {
        /// Objective id
        #[arg(value_name = "ID")]
        id: i64,

        /// Objective title
        #[arg(long)]
        title: String,

        /// Accountable driver
        #[arg(long)]
        driver: String,

        /// Optional description
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete an objective (cascades to its key results and comments)
    Rm {
        /// Objective id
        #[arg(value_name = "ID")]
        id: i64,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// List objectives
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one objective with key results, monthly data, and comments
    Show {
        /// Objective id
        #[arg(value_name = "ID")]
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum KrCommands {
    /// Add a key result to an objective
    Add {
        /// Owning objective id
        #[arg(value_name = "OBJECTIVE_ID")]
        objective_id: i64,

        /// Key result title
        #[arg(long)]
        title: String,

        /// What is measured
        #[arg(long)]
        metric: String,

        /// Unit of measure
        #[arg(long)]
        unit: Option<String>,

        /// Lower is better (tickets, incidents, downtime)
        #[arg(long)]
        inverse: bool,
    },

    /// Edit a key result (replaces title/metric/unit/inverse)
    Edit {
        /// Key result id
        #[arg(value_name = "ID")]
        id: i64,

        /// Key result title
        #[arg(long)]
        title: String,

        /// What is measured
        #[arg(long)]
        metric: String,

        /// Unit of measure
        #[arg(long)]
        unit: Option<String>,

        /// Lower is better
        #[arg(long)]
        inverse: bool,
    },

    /// Delete a key result (cascades to its monthly data)
    Rm {
        /// Key result id
        #[arg(value_name = "ID")]
        id: i64,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut cli = Cli::parse();

    match cli.command.take() {
        Some(Commands::Init) => {
            let config_path = config::default_config_path()?;
            if !config_path.exists() {
                config::write_config(&config_path, &config::OkrConfig::default())?;
                if !cli.quiet {
                    println!("Wrote config to {}", config_path.display());
                }
            }
            let session = open_session(&cli)?;
            let count = session.store().objectives()?.len();
            session.close()?;
            if !cli.quiet {
                println!("Database ready ({} objectives)", count);
            }
        }
        Some(Commands::Objective { command }) => run_objective(&cli, command)?,
        Some(Commands::Kr { command }) => run_kr(&cli, command)?,
        Some(Commands::Set {
            key_result_id,
            month,
            target,
            actual,
        }) => {
            if target.is_none() && actual.is_none() {
                return Err(anyhow::anyhow!("Provide --target and/or --actual"));
            }
            let mut update = MonthlyUpdate::new();
            if let Some(value) = target {
                update = update.target(value);
            }
            if let Some(value) = actual {
                update = update.actual(value);
            }

            let session = open_session(&cli)?;
            let affected = session
                .store()
                .update_monthly_data(key_result_id, &month, &update)?;
            if affected == 0 {
                return Err(anyhow::anyhow!(
                    "No monthly row for key result {} in {} (outside the tracking window?)",
                    key_result_id,
                    month
                ));
            }
            session.close()?;
            if !cli.quiet {
                println!("Updated key result {} for {}", key_result_id, month);
            }
        }
        Some(Commands::Comment {
            objective_id,
            month,
            text,
        }) => {
            let session = open_session(&cli)?;
            session.store().upsert_comment(objective_id, &month, &text)?;
            session.close()?;
            if !cli.quiet {
                println!("Saved comment for objective {} in {}", objective_id, month);
            }
        }
        Some(Commands::Dashboard { month, json }) => {
            let month = match month {
                Some(value) => {
                    ensure_month(&value)?;
                    value
                }
                None => current_month(),
            };

            let session = open_session(&cli)?;
            let details = session.store().objectives_with_details()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                if session.store().window().is_ended(&month) {
                    println!(
                        "{}",
                        format!(
                            "Tracking period ended {}",
                            session.store().window().end
                        )
                        .yellow()
                    );
                }
                println!("Dashboard for {}", okr_core::window::format_month(&month));
                println!("{}", dashboard::render(&details, &month));
                println!("{}", dashboard::summary(&details, &month));
            }
        }
        Some(Commands::CopyTargets {
            source_month,
            target_months,
        }) => {
            let session = open_session(&cli)?;
            let outcome = copy_targets_to_months(session.store(), &source_month, &target_months)?;
            session.close()?;

            if !cli.quiet {
                println!("Updated {} monthly targets", outcome.updated);
            }
            for error in &outcome.errors {
                eprintln!("{} {}", "warning:".yellow(), error);
            }
        }
        Some(Commands::Export { path, format }) => {
            let extension = match format.as_str() {
                "db" => "db",
                "json" => "json",
                other => {
                    return Err(anyhow::anyhow!(
                        "Unsupported export format: {} (use db or json)",
                        other
                    ));
                }
            };
            let path = path.unwrap_or_else(|| default_export_name(extension));

            let session = open_session(&cli)?;
            match format.as_str() {
                "db" => {
                    export_to_file(session.store(), Path::new(&path))?;
                }
                _ => {
                    let document = export_document(session.store())?;
                    std::fs::write(&path, serde_json::to_string_pretty(&document)?)?;
                }
            }
            if !cli.quiet {
                println!("Exported database to {}", path);
            }
        }
        Some(Commands::Import { path, yes }) => {
            if !yes
                && !Confirm::new()
                    .with_prompt(format!(
                        "Replace the current database with {}? This cannot be undone",
                        path
                    ))
                    .default(false)
                    .interact()?
            {
                return Ok(());
            }

            let mut session = open_session(&cli)?;
            let window = session.store().window().clone();
            let imported = import_from_file(Path::new(&path), window)?;
            session.adopt(imported)?;
            if !cli.quiet {
                println!("Imported database from {}", path);
            }
        }
        Some(Commands::Backup { destination }) => {
            let config = config::load_or_default()?;
            let data_dir = config::resolve_data_dir(&config, cli.data_dir.as_deref())?;
            let snapshot = DirSnapshotStore::new(&data_dir).snapshot_path();
            if !snapshot.exists() {
                return Err(anyhow::anyhow!(
                    "No snapshot found at {} (run `okr init` first)",
                    snapshot.display()
                ));
            }
            let count = std::fs::copy(&snapshot, &destination).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to copy snapshot from {} to {}: {}",
                    snapshot.display(),
                    destination,
                    e
                )
            })?;
            if count == 0 {
                return Err(anyhow::anyhow!("Backup failed: zero bytes written"));
            }
            if !cli.quiet {
                println!("Backed up snapshot to {}", destination);
            }
        }
        Some(Commands::Check) => {
            let session = open_session(&cli)?;
            match session.store().check_integrity() {
                Ok(()) => {
                    if !cli.quiet {
                        println!("Integrity check: {}", "OK".green());
                        println!("- tables: OK");
                        println!("- foreign keys: OK");
                        println!("- month values: OK");
                        println!("- version history: OK");
                    }
                }
                Err(err) => {
                    eprintln!("Integrity check: {}", "FAILED".red());
                    eprintln!("- error: {}", err);
                    return Err(anyhow::anyhow!("Integrity check failed"));
                }
            }
            let gaps = session.store().underprovisioned_key_results()?;
            if !gaps.is_empty() {
                println!(
                    "{} {} key results cover fewer months than the configured window: {:?}",
                    "note:".yellow(),
                    gaps.len(),
                    gaps
                );
            }
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "okr", &mut std::io::stdout());
        }
        None => {
            println!("OKR tracker v{}", VERSION);
            println!("\nRun `okr --help` for usage information.");
        }
    }

    Ok(())
}

fn run_objective(cli: &Cli, command: ObjectiveCommands) -> anyhow::Result<()> {
    match command {
        ObjectiveCommands::Add {
            title,
            driver,
            description,
        } => {
            let session = open_session(cli)?;
            let mut objective = NewObjective::new(title, driver);
            if let Some(text) = description {
                objective = objective.with_description(text);
            }
            let id = session.store().create_objective(&objective)?;
            session.close()?;
            if !cli.quiet {
                println!("Added objective {}", id);
            }
        }
        ObjectiveCommands::Edit {
            id,
            title,
            driver,
            description,
        } => {
            let session = open_session(cli)?;
            session.store().update_objective(
                id,
                &ObjectiveEdit {
                    title,
                    description,
                    driver,
                },
            )?;
            session.close()?;
            if !cli.quiet {
                println!("Updated objective {}", id);
            }
        }
        ObjectiveCommands::Rm { id, yes } => {
            if !confirm_delete(yes, &format!("Delete objective {} and all its key results?", id))? {
                return Ok(());
            }
            let session = open_session(cli)?;
            session.store().delete_objective(id)?;
            session.close()?;
            if !cli.quiet {
                println!("Deleted objective {}", id);
            }
        }
        ObjectiveCommands::List { json } => {
            let session = open_session(cli)?;
            let objectives = session.store().objectives()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&objectives)?);
            } else {
                if !cli.quiet {
                    println!("ID | DRIVER | TITLE");
                }
                for objective in objectives {
                    println!("{} | {} | {}", objective.id, objective.driver, objective.title);
                }
            }
        }
        ObjectiveCommands::Show { id, json } => {
            let session = open_session(cli)?;
            let details = session
                .store()
                .objective_with_details(id)?
                .ok_or_else(|| anyhow::anyhow!("Objective {} not found", id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                println!("Objective {}: {}", details.objective.id, details.objective.title);
                println!("Driver: {}", details.objective.driver);
                if !details.objective.description.is_empty() {
                    println!("Description: {}", details.objective.description);
                }
                println!();
                for kr in &details.key_results {
                    let inverse = if kr.key_result.inverse_metric {
                        " [inverse]"
                    } else {
                        ""
                    };
                    println!(
                        "  KR {}: {} ({}){}",
                        kr.key_result.id, kr.key_result.title, kr.key_result.metric, inverse
                    );
                    for month in &kr.monthly_data {
                        println!(
                            "    {}  target {:>8}  actual {:>8}",
                            month.month, month.target, month.actual
                        );
                    }
                }
                for comment in &details.comments {
                    if !comment.comment.is_empty() {
                        println!("  {}: {}", comment.month, comment.comment);
                    }
                }
            }
        }
    }
    Ok(())
}

fn run_kr(cli: &Cli, command: KrCommands) -> anyhow::Result<()> {
    match command {
        KrCommands::Add {
            objective_id,
            title,
            metric,
            unit,
            inverse,
        } => {
            let session = open_session(cli)?;
            let mut key_result = NewKeyResult::new(objective_id, title, metric);
            if let Some(value) = unit {
                key_result = key_result.with_unit(value);
            }
            if inverse {
                key_result = key_result.inverse();
            }
            let id = session.store().create_key_result(&key_result)?;
            session.close()?;
            if !cli.quiet {
                println!("Added key result {}", id);
            }
        }
        KrCommands::Edit {
            id,
            title,
            metric,
            unit,
            inverse,
        } => {
            let session = open_session(cli)?;
            session.store().update_key_result(
                id,
                &KeyResultEdit {
                    title,
                    metric,
                    unit,
                    inverse_metric: inverse,
                },
            )?;
            session.close()?;
            if !cli.quiet {
                println!("Updated key result {}", id);
            }
        }
        KrCommands::Rm { id, yes } => {
            if !confirm_delete(yes, &format!("Delete key result {} and its monthly data?", id))? {
                return Ok(());
            }
            let session = open_session(cli)?;
            session.store().delete_key_result(id)?;
            session.close()?;
            if !cli.quiet {
                println!("Deleted key result {}", id);
            }
        }
    }
    Ok(())
}

fn open_session(cli: &Cli) -> anyhow::Result<Session> {
    let config = config::load_or_default()?;
    let window = config::resolve_window(&config)?;
    let data_dir = config::resolve_data_dir(&config, cli.data_dir.as_deref())?;
    let snapshots = Arc::new(DirSnapshotStore::new(&data_dir));
    Session::initialize(snapshots, window).map_err(|e| anyhow::anyhow!("{}", e))
}

fn default_export_name(extension: &str) -> String {
    format!(
        "okr-backup-{}.{}",
        chrono::Local::now().format("%Y-%m-%d-%H%M%S"),
        extension
    )
}

fn confirm_delete(skip: bool, prompt: &str) -> anyhow::Result<bool> {
    if skip {
        return Ok(true);
    }
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
