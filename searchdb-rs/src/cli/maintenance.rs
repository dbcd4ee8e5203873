//! Remove and cleanup commands.

use crate::cli::args::{CleanupArgs, RemoveArgs};
use crate::cli::output::{CommandResponse, Output};
use crate::database::SearchDatabase;
use crate::error::{Result, SearchError};
use crate::types::DocumentHandle;
use chrono::{TimeDelta, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub name: String,
    pub removed: Vec<DocumentHandle>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed_documents: usize,
    pub documents: usize,
    pub index_keys: usize,
    pub words: usize,
}

/// Remove the first document named `name`, or all of them.
pub fn remove_by_name(db: &SearchDatabase, name: &str, all: bool) -> Result<Vec<DocumentHandle>> {
    let mut removed = Vec::new();
    while let Some(doc) = db.find_document(name) {
        db.remove_document(doc);
        removed.push(doc);
        if !all {
            break;
        }
    }
    if removed.is_empty() {
        return Err(SearchError::DocumentNotFound(name.to_string()));
    }
    Ok(removed)
}

pub fn remove(db: &SearchDatabase, args: &RemoveArgs, output: &Output) -> Result<()> {
    let removed = remove_by_name(db, &args.name, args.all)?;
    let message = format!("Removed {} document(s)", removed.len());
    let response = CommandResponse::data(RemoveResponse {
        name: args.name.clone(),
        removed,
    })
    .with_message(message);
    output.print(&response)
}

pub fn cleanup(db: &SearchDatabase, args: &CleanupArgs, output: &Output) -> Result<()> {
    let removed_documents = match args.older_than_days {
        Some(days) => db.remove_old_documents(Utc::now(), TimeDelta::days(i64::from(days))),
        None => 0,
    };
    db.cleanup();

    let response = CommandResponse::data(CleanupResponse {
        removed_documents,
        documents: db.document_count(),
        index_keys: db.index_count(),
        words: db.word_count(),
    });
    output.print(&response)
}
