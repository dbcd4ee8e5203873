//! The search database: document table, inverted index and query execution.
//!
//! [`SearchDatabase`] is a cheap-to-clone handle over shared state guarded by
//! a single read-write lock. Indexing calls take the write lock, so a
//! concurrently running query sees a document either entirely before or
//! entirely after each call. Use [`SearchDatabase::update_document`] to apply
//! several indexing calls to a document as one step.
//!
//! ```
//! use searchdb::{DatabaseFlags, SearchDatabase};
//!
//! let db = SearchDatabase::new(DatabaseFlags::empty());
//! let pie = db.add_document("pie");
//! db.index_text(pie, "apple pie", true);
//! db.index_property(pie, "price", 12.5, true);
//!
//! let results = db.query_sync("apple price<20").unwrap();
//! assert_eq!(results[0].id, pie);
//! ```

pub mod index;
pub mod persist;
pub mod queries;
pub mod resolver;
pub mod text;

pub use queries::QueryStatus;
pub use resolver::{DatabaseView, FunctionCall, SearchFunction};

use crate::error::{QueryError, Result, SearchError};
use crate::query::SearchQuery;
use crate::types::{DocumentHandle, PropertyValue, QueryHandle, SearchResult};
use bitflags::bitflags;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use index::{DatabaseState, IndexKey};
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use queries::QueryTable;
use resolver::{FunctionRegistry, Resolver};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DatabaseFlags: u32 {
        const CASE_SENSITIVE = 1 << 0;
        const DO_NOT_INDEX_VARIATIONS = 1 << 1;
        /// Index the name given to `add_document` as text.
        const INDEX_DOCUMENT_NAME = 1 << 2;
        /// Reserved.
        const INDEX_DOCUMENT_SOURCE = 1 << 3;
        const SKIP_COMMON_WORDS = 1 << 4;
    }
}

impl Default for DatabaseFlags {
    fn default() -> Self {
        DatabaseFlags::empty()
    }
}

/// Summary counters of a database.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub documents: usize,
    pub index_keys: usize,
    pub words: usize,
    pub variations: usize,
    pub numbers: usize,
    pub properties: usize,
    pub postings: usize,
    pub symbols: usize,
    pub property_keywords: Vec<String>,
    pub dirty: bool,
}

struct Shared {
    state: RwLock<DatabaseState>,
    functions: RwLock<FunctionRegistry>,
    queries: Mutex<QueryTable>,
}

#[derive(Clone)]
pub struct SearchDatabase {
    shared: Arc<Shared>,
}

impl Default for SearchDatabase {
    fn default() -> Self {
        Self::new(DatabaseFlags::empty())
    }
}

impl std::fmt::Debug for SearchDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("SearchDatabase")
            .field("flags", &state.flags)
            .field("documents", &state.documents.len())
            .field("index_keys", &state.index.len())
            .finish()
    }
}

impl SearchDatabase {
    pub fn new(flags: DatabaseFlags) -> Self {
        Self::from_state(DatabaseState::new(flags))
    }

    fn from_state(state: DatabaseState) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                functions: RwLock::new(FunctionRegistry::new()),
                queries: Mutex::new(QueryTable::default()),
            }),
        }
    }

    pub fn flags(&self) -> DatabaseFlags {
        self.shared.state.read().flags
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Create a document. A new handle is returned even if the name exists.
    pub fn add_document(&self, name: &str) -> DocumentHandle {
        self.shared.state.write().add_document(name)
    }

    /// Return the first live document named `name`, creating one if needed.
    pub fn get_or_add_document(&self, name: &str) -> DocumentHandle {
        let mut state = self.shared.state.write();
        match state.find_document(name) {
            Some(doc) => doc,
            None => state.add_document(name),
        }
    }

    /// Case-insensitive lookup by name.
    pub fn find_document(&self, name: &str) -> Option<DocumentHandle> {
        self.shared.state.read().find_document(name)
    }

    pub fn is_document_valid(&self, doc: DocumentHandle) -> bool {
        self.shared.state.read().is_valid(doc)
    }

    pub fn remove_document(&self, doc: DocumentHandle) -> bool {
        self.shared.state.write().remove_document(doc)
    }

    pub fn document_name(&self, doc: DocumentHandle) -> Option<String> {
        self.shared.state.read().documents.get(&doc).map(|d| d.name.clone())
    }

    pub fn document_timestamp(&self, doc: DocumentHandle) -> Option<DateTime<Utc>> {
        self.shared.state.read().documents.get(&doc).map(|d| d.timestamp)
    }

    /// Set a document's timestamp, or touch it to now. Returns false if the
    /// document is invalid or already carries that timestamp.
    pub fn document_update_timestamp(&self, doc: DocumentHandle, timestamp: Option<DateTime<Utc>>) -> bool {
        let mut state = self.shared.state.write();
        let Some(document) = state.documents.get_mut(&doc) else {
            return false;
        };
        let timestamp = timestamp.unwrap_or_else(Utc::now);
        if document.timestamp == timestamp {
            return false;
        }
        document.timestamp = timestamp;
        state.dirty = true;
        true
    }

    pub fn document_property(&self, doc: DocumentHandle, name: &str) -> Option<PropertyValue> {
        let state = self.shared.state.read();
        let name = text::fold_case(name, state.case_sensitive());
        state.documents.get(&doc)?.properties.get(&name).cloned()
    }

    pub fn document_properties(&self, doc: DocumentHandle) -> BTreeMap<String, PropertyValue> {
        self.shared
            .state
            .read()
            .documents
            .get(&doc)
            .map(|d| d.properties.clone())
            .unwrap_or_default()
    }

    /// Live documents in handle order.
    pub fn documents(&self) -> Vec<DocumentHandle> {
        self.shared.state.read().documents.keys().copied().collect()
    }

    // ========================================================================
    // Indexing
    // ========================================================================

    pub fn index_word(&self, doc: DocumentHandle, word: &str, include_variations: bool) -> bool {
        self.shared.state.write().index_word(doc, word, include_variations)
    }

    /// Split `text` into words and index each of them.
    pub fn index_text(&self, doc: DocumentHandle, text: &str, include_variations: bool) -> bool {
        self.shared.state.write().index_text(doc, text, include_variations)
    }

    /// Index `word` verbatim (only case-folded) with a top score.
    pub fn index_exact_match(&self, doc: DocumentHandle, word: &str, case_sensitive: bool) -> bool {
        self.shared.state.write().index_exact_match(doc, word, case_sensitive)
    }

    pub fn index_property(
        &self,
        doc: DocumentHandle,
        name: &str,
        value: impl Into<PropertyValue>,
        include_variations: bool,
    ) -> bool {
        self.shared
            .state
            .write()
            .index_property(doc, name, value.into(), include_variations)
    }

    /// Index a date as a numeric property holding its Unix timestamp, so that
    /// queries such as `listed>=2020-01-01` compare against it.
    pub fn index_date_property(&self, doc: DocumentHandle, name: &str, date: NaiveDate) -> bool {
        let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
            return false;
        };
        let timestamp = midnight.and_utc().timestamp() as f64;
        self.index_property(doc, name, timestamp, false)
    }

    /// Apply several indexing calls to `doc` under one write lock.
    /// Returns `None` if the document is invalid.
    pub fn update_document<R>(&self, doc: DocumentHandle, update: impl FnOnce(&mut DocumentWriter<'_>) -> R) -> Option<R> {
        let mut state = self.shared.state.write();
        if !state.is_valid(doc) {
            return None;
        }
        let mut writer = DocumentWriter { state: &mut *state, doc };
        Some(update(&mut writer))
    }

    // ========================================================================
    // Counters
    // ========================================================================

    /// Number of distinct index keys.
    pub fn index_count(&self) -> usize {
        self.shared.state.read().index.len()
    }

    pub fn document_count(&self) -> usize {
        self.shared.state.read().documents.len()
    }

    /// Number of distinct strings ever interned by indexing, until [`cleanup`](Self::cleanup).
    pub fn word_count(&self) -> usize {
        self.shared.state.read().symbols.len()
    }

    pub fn word_document_count(&self, word: &str, include_variations: bool) -> usize {
        self.shared.state.read().word_document_count(word, include_variations)
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.shared.state.read().contains_word(word)
    }

    pub fn property_keywords(&self) -> Vec<String> {
        self.shared.state.read().property_keywords()
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.state.read().dirty
    }

    pub fn stats(&self) -> DatabaseStats {
        let state = self.shared.state.read();
        let mut stats = DatabaseStats {
            documents: state.documents.len(),
            index_keys: state.index.len(),
            words: 0,
            variations: 0,
            numbers: 0,
            properties: 0,
            postings: 0,
            symbols: state.symbols.len(),
            property_keywords: state.property_keywords(),
            dirty: state.dirty,
        };
        for (key, postings) in &state.index {
            stats.postings += postings.len();
            match key {
                IndexKey::Word { .. } => stats.words += 1,
                IndexKey::Variation { .. } => stats.variations += 1,
                IndexKey::Number { .. } => stats.numbers += 1,
                IndexKey::Property { .. } | IndexKey::PropertyVariation { .. } => stats.properties += 1,
            }
        }
        stats
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        tracing::info!(
            documents = stats.documents,
            index_keys = stats.index_keys,
            words = stats.words,
            variations = stats.variations,
            numbers = stats.numbers,
            properties = stats.properties,
            postings = stats.postings,
            symbols = stats.symbols,
            "search database stats"
        );
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Remove documents whose timestamp is older than `reference - timeout`.
    ///
    /// A cutoff before the representable range removes nothing.
    pub fn remove_old_documents(&self, reference: DateTime<Utc>, timeout: TimeDelta) -> usize {
        let Some(cutoff) = reference.checked_sub_signed(timeout) else {
            return 0;
        };
        let removed = self.shared.state.write().remove_documents_before(cutoff);
        if removed > 0 {
            tracing::info!(removed, "removed old documents");
        }
        removed
    }

    /// Drop strings no longer referenced by any key.
    pub fn cleanup(&self) {
        self.shared.state.write().cleanup();
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Register a resolver for `name(...)` query leaves. Names are case-insensitive.
    pub fn register_function(&self, name: &str, function: impl SearchFunction + 'static) {
        self.shared
            .functions
            .write()
            .insert(name.to_lowercase(), Arc::new(function));
    }

    pub fn unregister_function(&self, name: &str) -> bool {
        self.shared.functions.write().remove(&name.to_lowercase()).is_some()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn evaluate(&self, query: &SearchQuery) -> std::result::Result<Vec<SearchResult>, QueryError> {
        let state = self.shared.state.read();
        let functions = self.shared.functions.read();
        let resolver = Resolver::new(&state, &functions);
        let mut results = crate::query::evaluate(query.root(), &resolver)?;
        results.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        Ok(results)
    }

    /// Parse `text` and evaluate it on the calling thread. Results are
    /// ranked by descending score, then by handle.
    pub fn query_sync(&self, text: &str) -> std::result::Result<Vec<SearchResult>, QueryError> {
        let query = SearchQuery::parse(text)?;
        self.evaluate(&query)
    }

    /// Post a query for evaluation on the worker pool. Parse errors are
    /// returned immediately; poll [`query_is_completed`](Self::query_is_completed).
    pub fn query(&self, text: &str) -> std::result::Result<QueryHandle, QueryError> {
        let query = SearchQuery::parse(text)?;
        let handle = self.shared.queries.lock().allocate(text);

        let db = self.clone();
        rayon::spawn(move || {
            let outcome = db.evaluate(&query);
            if let Err(e) = &outcome {
                tracing::warn!(query = query.text(), "query evaluation failed: {}", e);
            }
            db.shared.queries.lock().complete(handle, outcome);
        });
        Ok(handle)
    }

    pub fn query_status(&self, handle: QueryHandle) -> Option<QueryStatus> {
        self.shared.queries.lock().status(handle).cloned()
    }

    pub fn query_is_completed(&self, handle: QueryHandle) -> bool {
        matches!(
            self.shared.queries.lock().status(handle),
            Some(QueryStatus::Completed(_) | QueryStatus::Failed(_))
        )
    }

    /// Snapshot of a completed query's results, excluding documents removed
    /// since it was evaluated.
    pub fn query_results(&self, handle: QueryHandle) -> Option<Arc<[SearchResult]>> {
        let results = match self.shared.queries.lock().status(handle) {
            Some(QueryStatus::Completed(results)) => Arc::clone(results),
            _ => return None,
        };

        let state = self.shared.state.read();
        if results.iter().all(|r| state.is_valid(r.id)) {
            return Some(results);
        }
        Some(results.iter().filter(|r| state.is_valid(r.id)).copied().collect())
    }

    pub fn query_error(&self, handle: QueryHandle) -> Option<QueryError> {
        match self.shared.queries.lock().status(handle) {
            Some(QueryStatus::Failed(e)) => Some(e.clone()),
            _ => None,
        }
    }

    pub fn query_text(&self, handle: QueryHandle) -> Option<String> {
        self.shared.queries.lock().text(handle).map(str::to_string)
    }

    /// Release a query. Safe to call while it is still being evaluated.
    pub fn query_dispose(&self, handle: QueryHandle) -> bool {
        self.shared.queries.lock().dispose(handle)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Serialize documents, terms, postings and properties.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        let state = self.shared.state.upgradable_read();
        persist::write_state(&state, writer)?;
        RwLockUpgradableReadGuard::upgrade(state).dirty = false;
        Ok(())
    }

    pub fn load<R: Read>(reader: R) -> Result<Self> {
        Ok(Self::from_state(persist::read_state(reader)?))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let mut buffer = Vec::new();
        self.save(&mut buffer)?;
        persist::atomic_write(path, &buffer)?;
        tracing::info!(path = %path.display(), bytes = buffer.len(), "saved search database");
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SearchError::DatabaseNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        let db = Self::load(std::io::BufReader::new(file))?;
        tracing::info!(path = %path.display(), documents = db.document_count(), "loaded search database");
        Ok(db)
    }
}

/// Indexing access to one document while the write lock is held.
pub struct DocumentWriter<'a> {
    state: &'a mut DatabaseState,
    doc: DocumentHandle,
}

impl DocumentWriter<'_> {
    pub fn document(&self) -> DocumentHandle {
        self.doc
    }

    pub fn index_word(&mut self, word: &str, include_variations: bool) -> bool {
        self.state.index_word(self.doc, word, include_variations)
    }

    pub fn index_text(&mut self, text: &str, include_variations: bool) -> bool {
        self.state.index_text(self.doc, text, include_variations)
    }

    pub fn index_exact_match(&mut self, word: &str, case_sensitive: bool) -> bool {
        self.state.index_exact_match(self.doc, word, case_sensitive)
    }

    pub fn index_property(&mut self, name: &str, value: impl Into<PropertyValue>, include_variations: bool) -> bool {
        self.state.index_property(self.doc, name, value.into(), include_variations)
    }
}
