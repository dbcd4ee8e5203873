//! searchdb CLI entry point.

use clap::Parser;
use searchdb::cli::args::{Cli, Commands};
use searchdb::cli::output::Output;
use searchdb::cli::{index, maintenance, parse, query, stats};
use searchdb::config::Config;
use searchdb::error::{ExitCode as SearchExitCode, SearchError};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => ExitCode::from(code.code() as u8),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {}", e);
            }
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn init_logging(cli: &Cli, config: &Config) {
    let level = cli.log_level(&config.log.level);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("searchdb={}", level).into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<SearchExitCode, SearchError> {
    // Load config
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    init_logging(cli, &config);

    let output = Output::new(cli.output_format(), cli.quiet);

    // Parsing needs no database
    if let Commands::Parse(args) = &cli.command {
        parse::run(args, &output)?;
        return Ok(SearchExitCode::Success);
    }

    let db_path = config.resolve_database_path(cli.database.as_deref())?;

    match &cli.command {
        Commands::Index(args) => {
            let db = searchdb::cli::open_or_create(&db_path, &config)?;
            index::run(&db, args, &output)?;
            searchdb::cli::save_if_dirty(&db, &db_path)?;
        }
        Commands::Query(args) => {
            let db = searchdb::SearchDatabase::load_from_path(&db_path)?;
            query::run(&db, args, &output)?;
        }
        Commands::Stats => {
            let db = searchdb::SearchDatabase::load_from_path(&db_path)?;
            stats::run(&db, &db_path.display().to_string(), &output)?;
        }
        Commands::Remove(args) => {
            let db = searchdb::SearchDatabase::load_from_path(&db_path)?;
            maintenance::remove(&db, args, &output)?;
            searchdb::cli::save_if_dirty(&db, &db_path)?;
        }
        Commands::Cleanup(args) => {
            let db = searchdb::SearchDatabase::load_from_path(&db_path)?;
            maintenance::cleanup(&db, args, &output)?;
            searchdb::cli::save_if_dirty(&db, &db_path)?;
        }
        Commands::Parse(_) => {}
    }

    Ok(SearchExitCode::Success)
}
