//! Document table and inverted index.
//!
//! Every indexed fact is a posting of a document under an [`IndexKey`]. Each
//! document also records the keys it was posted under, so removing it only
//! touches its own postings.

use crate::database::DatabaseFlags;
use crate::database::text;
use crate::types::{DocumentHandle, PropertyValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::ops::Bound;

// ============================================================================
// Scores
// ============================================================================

pub const EXACT_MATCH_SCORE: i32 = 1_000_000;
pub const WORD_SCORE: i32 = 1_000;
pub const PROPERTY_SCORE: i32 = 500;

fn term_len(term: &str) -> i32 {
    term.chars().count() as i32
}

// ============================================================================
// Keys
// ============================================================================

/// A finite `f64` with a total order, usable as a map key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NumberKey(f64);

impl NumberKey {
    pub fn new(value: f64) -> Self {
        // -0.0 and 0.0 must land on the same key
        Self(value + 0.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for NumberKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NumberKey {}

impl PartialOrd for NumberKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NumberKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for NumberKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexKey {
    Word { term: String },
    Variation { term: String },
    Number { property: String, value: NumberKey },
    Property { property: String, value: String },
    PropertyVariation { property: String, value: String },
}

impl IndexKey {
    pub fn property(&self) -> Option<&str> {
        match self {
            IndexKey::Number { property, .. }
            | IndexKey::Property { property, .. }
            | IndexKey::PropertyVariation { property, .. } => Some(property),
            IndexKey::Word { .. } | IndexKey::Variation { .. } => None,
        }
    }

    /// Key range covering the numbers of `property` between two bounds.
    pub fn number_range(property: &str, lower: Bound<f64>, upper: Bound<f64>) -> (Bound<IndexKey>, Bound<IndexKey>) {
        let key = |value: f64| IndexKey::Number {
            property: property.to_string(),
            value: NumberKey::new(value),
        };
        let map = |bound: Bound<f64>, unbounded: f64| match bound {
            Bound::Included(v) => Bound::Included(key(v)),
            Bound::Excluded(v) => Bound::Excluded(key(v)),
            Bound::Unbounded => Bound::Included(key(unbounded)),
        };
        (map(lower, f64::NEG_INFINITY), map(upper, f64::INFINITY))
    }
}

/// Postings of one key: document to score.
pub type Postings = BTreeMap<DocumentHandle, i32>;

// ============================================================================
// Documents
// ============================================================================

#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub properties: BTreeMap<String, PropertyValue>,
    pub keys: BTreeSet<IndexKey>,
}

impl Document {
    pub(crate) fn new(name: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            timestamp,
            properties: BTreeMap::new(),
            keys: BTreeSet::new(),
        }
    }
}

// ============================================================================
// Database state
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DatabaseState {
    pub flags: DatabaseFlags,
    pub documents: BTreeMap<DocumentHandle, Document>,
    pub names: HashMap<String, BTreeSet<DocumentHandle>>,
    pub index: BTreeMap<IndexKey, Postings>,
    pub symbols: HashSet<String>,
    pub next_handle: u32,
    pub dirty: bool,
}

impl DatabaseState {
    pub fn new(flags: DatabaseFlags) -> Self {
        Self {
            flags,
            next_handle: 1,
            ..Default::default()
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.flags.contains(DatabaseFlags::CASE_SENSITIVE)
    }

    pub fn variations_enabled(&self) -> bool {
        !self.flags.contains(DatabaseFlags::DO_NOT_INDEX_VARIATIONS)
    }

    fn skip_common_words(&self) -> bool {
        self.flags.contains(DatabaseFlags::SKIP_COMMON_WORDS)
    }

    pub fn is_valid(&self, doc: DocumentHandle) -> bool {
        self.documents.contains_key(&doc)
    }

    pub fn postings(&self, key: &IndexKey) -> Option<&Postings> {
        self.index.get(key)
    }

    // ========================================================================
    // Documents
    // ========================================================================

    pub fn add_document(&mut self, name: &str) -> DocumentHandle {
        let handle = DocumentHandle(self.next_handle);
        self.next_handle += 1;
        self.insert_document(handle, Document::new(name, Utc::now()));
        self.dirty = true;

        if self.flags.contains(DatabaseFlags::INDEX_DOCUMENT_NAME) {
            let include_variations = self.variations_enabled();
            self.index_text(handle, name, include_variations);
        }
        handle
    }

    pub(crate) fn insert_document(&mut self, handle: DocumentHandle, document: Document) {
        self.names
            .entry(document.name.to_lowercase())
            .or_default()
            .insert(handle);
        self.documents.insert(handle, document);
    }

    pub fn find_document(&self, name: &str) -> Option<DocumentHandle> {
        self.names
            .get(&name.to_lowercase())
            .and_then(|handles| handles.first().copied())
    }

    pub fn remove_document(&mut self, doc: DocumentHandle) -> bool {
        let Some(document) = self.documents.remove(&doc) else {
            return false;
        };

        let lowered = document.name.to_lowercase();
        if let Some(handles) = self.names.get_mut(&lowered) {
            handles.remove(&doc);
            if handles.is_empty() {
                self.names.remove(&lowered);
            }
        }

        for key in &document.keys {
            self.unpost(key, doc);
        }
        self.dirty = true;
        true
    }

    // ========================================================================
    // Postings
    // ========================================================================

    fn intern(&mut self, symbol: &str) {
        if !self.symbols.contains(symbol) {
            self.symbols.insert(symbol.to_string());
        }
    }

    /// Post `doc` under `key`, keeping the best score if already posted.
    fn post(&mut self, doc: DocumentHandle, key: IndexKey, score: i32) {
        let Some(document) = self.documents.get_mut(&doc) else {
            return;
        };
        document.keys.insert(key.clone());
        let best = self.index.entry(key).or_default().entry(doc).or_insert(score);
        *best = (*best).max(score);
        self.dirty = true;
    }

    fn unpost(&mut self, key: &IndexKey, doc: DocumentHandle) {
        if let Some(postings) = self.index.get_mut(key) {
            postings.remove(&doc);
            if postings.is_empty() {
                self.index.remove(key);
            }
        }
    }

    fn post_term(&mut self, doc: DocumentHandle, term: &str, include_variations: bool) {
        self.intern(term);
        self.post(
            doc,
            IndexKey::Word {
                term: term.to_string(),
            },
            WORD_SCORE + term_len(term),
        );

        if include_variations {
            for variation in text::variations(term) {
                self.intern(&variation);
                let score = term_len(&variation);
                self.post(doc, IndexKey::Variation { term: variation }, score);
            }
        }
    }

    // ========================================================================
    // Indexing
    // ========================================================================

    pub fn index_word(&mut self, doc: DocumentHandle, word: &str, include_variations: bool) -> bool {
        let cleaned = text::clean_up(word);
        if text::should_skip(cleaned, self.skip_common_words()) || !self.is_valid(doc) {
            return false;
        }

        let folded = text::fold_case(cleaned, self.case_sensitive());
        let term = text::truncate(text::strip_plural(&folded).to_string());
        let include_variations = include_variations && self.variations_enabled();
        self.post_term(doc, &term, include_variations);
        true
    }

    pub fn index_text(&mut self, doc: DocumentHandle, content: &str, include_variations: bool) -> bool {
        if content.trim().is_empty() || !self.is_valid(doc) {
            return false;
        }

        let include_variations = include_variations && self.variations_enabled();
        let case_sensitive = self.case_sensitive();
        let skip_common = self.skip_common_words();
        let terms: Vec<String> = text::split_words(content)
            .filter(|word| !text::should_skip(word, skip_common))
            .map(|word| text::truncate(text::fold_case(&text::remove_punctuation(word), case_sensitive)))
            .filter(|term| !term.is_empty())
            .collect();

        for term in terms {
            self.post_term(doc, &term, include_variations);
        }
        true
    }

    pub fn index_exact_match(&mut self, doc: DocumentHandle, word: &str, case_sensitive: bool) -> bool {
        if word.trim().is_empty() || !self.is_valid(doc) {
            return false;
        }

        let term = text::truncate(text::fold_case(word, case_sensitive || self.case_sensitive()));
        self.intern(&term);
        let score = EXACT_MATCH_SCORE + term_len(&term);
        self.post(doc, IndexKey::Word { term }, score);
        true
    }

    /// Attach a property, replacing any previous value of the same name.
    pub fn index_property(
        &mut self,
        doc: DocumentHandle,
        name: &str,
        value: PropertyValue,
        include_variations: bool,
    ) -> bool {
        let property = text::fold_case(name, self.case_sensitive());
        if property.is_empty() || !self.is_valid(doc) {
            return false;
        }
        if let PropertyValue::Number(n) = value {
            if !n.is_finite() {
                tracing::warn!(property = %property, value = n, "ignoring non-finite property value");
                return false;
            }
        }

        self.clear_property(doc, &property);
        self.intern(&property);

        match &value {
            PropertyValue::Number(n) => {
                let key = IndexKey::Number {
                    property: property.clone(),
                    value: NumberKey::new(*n),
                };
                self.post(doc, key, PROPERTY_SCORE);
            }
            PropertyValue::Text(s) => {
                let include_variations = include_variations && self.variations_enabled();
                self.post_property_text(doc, &property, s, include_variations);
            }
        }

        if let Some(document) = self.documents.get_mut(&doc) {
            document.properties.insert(property, value);
        }
        self.dirty = true;
        true
    }

    fn post_property_text(&mut self, doc: DocumentHandle, property: &str, value: &str, include_variations: bool) {
        let folded = text::fold_case(value, self.case_sensitive());
        if folded.is_empty() {
            return;
        }
        if folded.chars().count() >= text::MIN_WORD_LENGTH
            && text::should_skip(text::clean_up(&folded), self.skip_common_words())
        {
            return;
        }

        let term = text::truncate(text::strip_plural(&folded).to_string());
        self.intern(&term);
        self.post(
            doc,
            IndexKey::Property {
                property: property.to_string(),
                value: term.clone(),
            },
            PROPERTY_SCORE + term_len(&term),
        );

        if include_variations {
            for variation in text::variations(&term) {
                self.intern(&variation);
                let score = term_len(&variation);
                let key = IndexKey::PropertyVariation {
                    property: property.to_string(),
                    value: variation,
                };
                self.post(doc, key, score);
            }
        }
    }

    fn clear_property(&mut self, doc: DocumentHandle, property: &str) {
        let Some(document) = self.documents.get_mut(&doc) else {
            return;
        };
        if document.properties.remove(property).is_none() {
            return;
        }
        let stale: Vec<IndexKey> = document
            .keys
            .iter()
            .filter(|key| key.property() == Some(property))
            .cloned()
            .collect();
        for key in &stale {
            document.keys.remove(key);
        }
        for key in &stale {
            self.unpost(key, doc);
        }
    }

    // ========================================================================
    // Counters
    // ========================================================================

    pub fn word_document_count(&self, word: &str, include_variations: bool) -> usize {
        let folded = text::fold_case(text::clean_up(word), self.case_sensitive());
        let term = text::truncate(text::strip_plural(&folded).to_string());
        let count = |key: IndexKey| self.index.get(&key).map_or(0, BTreeMap::len);

        let mut total = count(IndexKey::Word { term: term.clone() });
        if include_variations {
            total += count(IndexKey::Variation { term });
        }
        total
    }

    pub fn contains_word(&self, word: &str) -> bool {
        let term = text::fold_case(word, self.case_sensitive());
        self.symbols.contains(&term)
    }

    pub fn property_keywords(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.index.keys().filter_map(IndexKey::property).collect();
        names.into_iter().map(str::to_string).collect()
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Remove documents last touched before `cutoff`. Returns how many.
    pub fn remove_documents_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let stale: Vec<DocumentHandle> = self
            .documents
            .iter()
            .filter(|(_, document)| document.timestamp < cutoff)
            .map(|(handle, _)| *handle)
            .collect();
        for handle in &stale {
            self.remove_document(*handle);
        }
        stale.len()
    }

    /// Rebuild the symbol table from live keys and release spare capacity.
    pub fn cleanup(&mut self) {
        self.index.retain(|_, postings| !postings.is_empty());

        let mut symbols = HashSet::new();
        for key in self.index.keys() {
            match key {
                IndexKey::Word { term } | IndexKey::Variation { term } => {
                    symbols.insert(term.clone());
                }
                IndexKey::Number { property, .. } => {
                    symbols.insert(property.clone());
                }
                IndexKey::Property { property, value }
                | IndexKey::PropertyVariation { property, value } => {
                    symbols.insert(property.clone());
                    symbols.insert(value.clone());
                }
            }
        }
        symbols.shrink_to_fit();
        self.symbols = symbols;
        self.names.shrink_to_fit();
        self.dirty = true;
    }
}
