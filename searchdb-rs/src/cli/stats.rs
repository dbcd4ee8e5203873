//! Stats command implementation.

use crate::cli::output::{CommandResponse, Output};
use crate::database::{DatabaseStats, SearchDatabase};
use crate::error::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub database: String,
    pub flags: String,
    pub stats: DatabaseStats,
}

pub fn run(db: &SearchDatabase, database: &str, output: &Output) -> Result<()> {
    db.log_stats();
    let response = StatsResponse {
        database: database.to_string(),
        flags: format!("{:?}", db.flags()),
        stats: db.stats(),
    };
    output.print(&CommandResponse::data(response))
}
