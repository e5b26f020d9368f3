use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlite_tables::{roster, StoreConfig, StoreManager, StorePath};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sqlite_tables",
    version,
    about = "Seed the demo tables of an embedded SQLite store and print joined reports"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Database file, or :memory: for a store discarded on exit [default: <tmpdir>/ex_db.db]"
    )]
    db: Option<String>,
    #[arg(long, global = true, help = "JSON store config; --db overrides its path")]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Log at debug level")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the school and person tables if missing and insert their rows
    Seed,
    /// Print every person with their school name (run `seed` first)
    Report,
    /// Create, fill and print the player table
    Players,
    /// Run every seeded scenario against one store
    Run,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    StoreManager::scoped(&config, |store| -> Result<()> {
        match cli.command {
            Command::Seed => {
                let summary = roster::seed(store).context("seeding school and person tables")?;
                println!(
                    "schools: {} inserted, {} already present; persons: {} inserted",
                    summary.schools.inserted, summary.schools.rejected, summary.persons.inserted
                );
            }
            Command::Report => print_lines(roster::report(store).context("building person report")?),
            Command::Players => {
                print_lines(roster::player_roster(store).context("building player roster")?)
            }
            Command::Run => {
                roster::seed(store).context("seeding school and person tables")?;
                print_lines(roster::report(store).context("building person report")?);
                print_lines(roster::player_roster(store).context("building player roster")?);
            }
        }
        Ok(())
    })
    .with_context(|| format!("store {}", config.path))
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::new(std::env::temp_dir().join("ex_db.db")),
    };
    if let Some(db) = &cli.db {
        config.path = StorePath::from(db.as_str());
    }
    Ok(config)
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
