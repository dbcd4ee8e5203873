//! Index command implementation.

use crate::cli::args::IndexArgs;
use crate::cli::output::{CommandResponse, Output};
use crate::database::SearchDatabase;
use crate::error::{Result, SearchError};
use crate::types::{DocumentHandle, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One document in an input file. A file holds a single object or an array.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    pub name: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default)]
    pub exact: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentFile {
    Many(Vec<DocumentInput>),
    One(DocumentInput),
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub files: usize,
    pub index_keys: usize,
    pub document_count: usize,
    pub documents: Vec<IndexedDocument>,
}

#[derive(Debug, Serialize)]
pub struct IndexedDocument {
    pub id: DocumentHandle,
    pub name: String,
    pub path: String,
}

/// Expand arguments into files. Arguments without glob metacharacters are
/// taken literally so a missing file is reported rather than skipped.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            files.push(PathBuf::from(pattern));
            continue;
        }
        for entry in glob::glob(pattern)? {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => tracing::warn!("skipping unreadable path: {}", e),
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

pub fn read_documents(path: &Path) -> Result<Vec<DocumentInput>> {
    let content = fs::read_to_string(path)?;
    Ok(match serde_json::from_str(&content)? {
        DocumentFile::Many(documents) => documents,
        DocumentFile::One(document) => vec![document],
    })
}

/// Add or replace `input` in the database. An existing document of the same
/// name is removed first so re-indexing a file does not accumulate terms.
pub fn index_document(db: &SearchDatabase, input: &DocumentInput, include_variations: bool) -> Option<DocumentHandle> {
    if let Some(existing) = db.find_document(&input.name) {
        db.remove_document(existing);
    }
    let doc = db.add_document(&input.name);
    db.update_document(doc, |writer| {
        if let Some(text) = &input.text {
            writer.index_text(text, include_variations);
        }
        for word in &input.words {
            writer.index_word(word, include_variations);
        }
        for exact in &input.exact {
            writer.index_exact_match(exact, false);
        }
        for (name, value) in &input.properties {
            if !writer.index_property(name, value.clone(), include_variations) {
                tracing::warn!(document = %input.name, property = %name, "property not indexed");
            }
        }
    })?;
    Some(doc)
}

pub fn run(db: &SearchDatabase, args: &IndexArgs, output: &Output) -> Result<()> {
    let files = expand_patterns(&args.files)?;
    if files.is_empty() {
        return Err(SearchError::Other("No document files matched".to_string()));
    }

    let mut documents = Vec::new();
    let mut warnings = Vec::new();
    for path in &files {
        let inputs = match read_documents(path) {
            Ok(inputs) => inputs,
            Err(e) => {
                warnings.push(format!("{}: {}", path.display(), e));
                continue;
            }
        };
        for input in &inputs {
            if let Some(id) = index_document(db, input, !args.no_variations) {
                documents.push(IndexedDocument {
                    id,
                    name: input.name.clone(),
                    path: path.display().to_string(),
                });
            }
        }
    }

    for warning in &warnings {
        output.warn(warning);
    }
    output.info(&format!("Indexed {} documents from {} files", documents.len(), files.len()));
    let response = CommandResponse::data(IndexResponse {
        files: files.len(),
        index_keys: db.index_count(),
        document_count: db.document_count(),
        documents,
    })
    .with_warnings(warnings);
    output.print(&response)
}
