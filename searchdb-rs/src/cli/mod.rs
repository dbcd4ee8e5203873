//! CLI command implementations.

pub mod args;
pub mod output;

pub mod index;
pub mod maintenance;
pub mod parse;
pub mod query;
pub mod stats;

pub use args::{Cli, Commands};
pub use output::Output;

use crate::config::Config;
use crate::database::SearchDatabase;
use crate::error::Result;
use std::path::Path;

/// Load the database at `path`, or create an empty one with the configured
/// flags if the file does not exist yet.
pub fn open_or_create(path: &Path, config: &Config) -> Result<SearchDatabase> {
    if path.exists() {
        SearchDatabase::load_from_path(path)
    } else {
        tracing::debug!(path = %path.display(), "creating new search database");
        Ok(SearchDatabase::new(config.flags()))
    }
}

/// Save `db` back to `path` if anything changed.
pub fn save_if_dirty(db: &SearchDatabase, path: &Path) -> Result<()> {
    if db.is_dirty() {
        db.save_to_path(path)?;
    }
    Ok(())
}
