//! Save and load of the full database as JSON.

use crate::database::DatabaseFlags;
use crate::database::index::{DatabaseState, Document, IndexKey};
use crate::error::{Result, SearchError};
use crate::types::{DocumentHandle, PropertyValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

pub const DATABASE_MAGIC: &str = "SEARCHDB";

/// Increment when the file layout changes.
pub const DATABASE_VERSION: u32 = 12;

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseFile {
    magic: String,
    version: u32,
    flags: u32,
    next_handle: u32,
    documents: Vec<DocumentRecord>,
    index: Vec<IndexRecord>,
    symbols: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DocumentRecord {
    handle: DocumentHandle,
    name: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexRecord {
    key: IndexKey,
    postings: Vec<(DocumentHandle, i32)>,
}

pub fn write_state<W: Write>(state: &DatabaseState, writer: W) -> Result<()> {
    let documents = state
        .documents
        .iter()
        .map(|(handle, document)| DocumentRecord {
            handle: *handle,
            name: document.name.clone(),
            timestamp: document.timestamp,
            properties: document.properties.clone(),
        })
        .collect();

    let index = state
        .index
        .iter()
        .map(|(key, postings)| IndexRecord {
            key: key.clone(),
            postings: postings.iter().map(|(doc, score)| (*doc, *score)).collect(),
        })
        .collect();

    let symbols: BTreeSet<&String> = state.symbols.iter().collect();

    let file = DatabaseFile {
        magic: DATABASE_MAGIC.to_string(),
        version: DATABASE_VERSION,
        flags: state.flags.bits(),
        next_handle: state.next_handle,
        documents,
        index,
        symbols: symbols.into_iter().cloned().collect(),
    };
    serde_json::to_writer(writer, &file)?;
    Ok(())
}

pub fn read_state<R: Read>(reader: R) -> Result<DatabaseState> {
    let file: DatabaseFile = serde_json::from_reader(reader)?;
    if file.magic != DATABASE_MAGIC {
        return Err(SearchError::InvalidDatabase(format!(
            "unexpected header '{}'",
            file.magic
        )));
    }
    if file.version != DATABASE_VERSION {
        return Err(SearchError::InvalidDatabase(format!(
            "unsupported version {} (expected {})",
            file.version, DATABASE_VERSION
        )));
    }

    let mut state = DatabaseState::new(DatabaseFlags::from_bits_truncate(file.flags));
    for record in file.documents {
        if record.handle.is_invalid() {
            continue;
        }
        let mut document = Document::new(&record.name, record.timestamp);
        document.properties = record.properties;
        state.insert_document(record.handle, document);
    }

    for record in file.index {
        let mut postings = BTreeMap::new();
        for (doc, score) in record.postings {
            match state.documents.get_mut(&doc) {
                Some(document) => {
                    document.keys.insert(record.key.clone());
                    postings.insert(doc, score);
                }
                None => tracing::warn!(document = %doc, "dropping posting of unknown document"),
            }
        }
        if !postings.is_empty() {
            state.index.insert(record.key, postings);
        }
    }

    state.symbols = file.symbols.into_iter().collect();
    let highest = state.documents.keys().next_back().map_or(0, |h| h.0);
    state.next_handle = file.next_handle.max(highest + 1);
    state.dirty = false;
    Ok(state)
}

/// Write a file atomically (write to temp, then rename).
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| SearchError::Other(format!("Invalid database path: {}", path.display())))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = parent.join(format!(".{}.tmp.{}", file_name, std::process::id()));

    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        SearchError::Io(e)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_state() -> DatabaseState {
        let mut state = DatabaseState::new(DatabaseFlags::SKIP_COMMON_WORDS);
        let apple = state.add_document("AAPL.US");
        let removed = state.add_document("gone");
        state.index_text(apple, "apple computers", true);
        state.index_property(apple, "price", PropertyValue::Number(1.79), true);
        state.index_property(apple, "sector", PropertyValue::from("Technology"), true);
        state.remove_document(removed);
        state
    }

    #[test]
    fn test_state_roundtrip() {
        let state = sample_state();
        let mut buffer = Vec::new();
        write_state(&state, &mut buffer).unwrap();
        let loaded = read_state(buffer.as_slice()).unwrap();

        assert_eq!(loaded.flags, state.flags);
        assert_eq!(loaded.documents.len(), state.documents.len());
        assert_eq!(loaded.symbols, state.symbols);
        assert_eq!(loaded.index, state.index);
        assert_eq!(loaded.next_handle, 3);
        assert!(!loaded.dirty);

        let doc = loaded.find_document("aapl.us").unwrap();
        assert_eq!(loaded.documents[&doc].keys, state.documents[&doc].keys);
        assert_eq!(
            loaded.documents[&doc].properties["price"],
            PropertyValue::Number(1.79)
        );
    }

    #[test]
    fn test_rejects_bad_header() {
        let json = r#"{"magic":"NOPE","version":12,"flags":0,"next_handle":1,"documents":[],"index":[],"symbols":[]}"#;
        let err = read_state(json.as_bytes()).unwrap_err();
        assert!(matches!(err, SearchError::InvalidDatabase(_)));

        let json = r#"{"magic":"SEARCHDB","version":3,"flags":0,"next_handle":1,"documents":[],"index":[],"symbols":[]}"#;
        assert!(matches!(read_state(json.as_bytes()), Err(SearchError::InvalidDatabase(_))));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(read_state(&b"not json"[..]), Err(SearchError::JsonError(_))));
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("nested").join("db.json");

        atomic_write(&file_path, b"test content").unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "test content");
    }
}
