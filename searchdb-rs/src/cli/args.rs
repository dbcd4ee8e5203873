//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "searchdb")]
#[command(author, version, about = "Index documents and run boolean/property search queries", long_about = None)]
pub struct Cli {
    /// Path to the database file (overrides config)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output as JSON (default)
    #[arg(long, global = true, conflicts_with_all = ["yaml", "toml"])]
    pub json: bool,

    /// Output as YAML
    #[arg(long, global = true, conflicts_with_all = ["json", "toml"])]
    pub yaml: bool,

    /// Output as TOML
    #[arg(long, global = true, conflicts_with_all = ["json", "yaml"])]
    pub toml: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (can be repeated)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        if self.yaml {
            OutputFormat::Yaml
        } else if self.toml {
            OutputFormat::Toml
        } else {
            OutputFormat::Json
        }
    }

    /// Default log filter from `-v`/`-q`, falling back to the configured level.
    pub fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => configured,
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    Toml,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index JSON document files (globs accepted)
    Index(IndexArgs),

    /// Run a search query
    Query(QueryArgs),

    /// Show the tokens and expression tree of a query
    Parse(ParseArgs),

    /// Show database statistics
    Stats,

    /// Remove documents by name
    Remove(RemoveArgs),

    /// Drop old documents and compact the index
    Cleanup(CleanupArgs),
}

// === Index ===

#[derive(Parser, Debug)]
pub struct IndexArgs {
    /// Document files or glob patterns
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Do not index prefix variations of words
    #[arg(long)]
    pub no_variations: bool,
}

// === Query ===

#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// Query text, e.g. `apple -pie price<20`
    #[arg(allow_hyphen_values = true)]
    pub text: String,

    /// Maximum number of results
    #[arg(long)]
    pub limit: Option<usize>,
}

// === Parse ===

#[derive(Parser, Debug)]
pub struct ParseArgs {
    /// Query text
    #[arg(allow_hyphen_values = true)]
    pub text: String,
}

// === Remove ===

#[derive(Parser, Debug)]
pub struct RemoveArgs {
    /// Document name (case-insensitive)
    pub name: String,

    /// Remove every document with that name, not just the first
    #[arg(long)]
    pub all: bool,
}

// === Cleanup ===

#[derive(Parser, Debug)]
pub struct CleanupArgs {
    /// Remove documents not touched for this many days
    #[arg(long)]
    pub older_than_days: Option<u32>,
}
