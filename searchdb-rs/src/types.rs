//! Shared types for searchdb.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a document in a [`SearchDatabase`](crate::SearchDatabase).
///
/// Handles are allocated monotonically starting at 1 and are never reused by
/// the database that issued them. `0` is reserved as [`DocumentHandle::INVALID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentHandle(pub u32);

impl DocumentHandle {
    pub const INVALID: DocumentHandle = DocumentHandle(0);

    pub fn is_invalid(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a posted query. `0` is reserved as [`QueryHandle::INVALID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryHandle(pub u32);

impl QueryHandle {
    pub const INVALID: QueryHandle = QueryHandle(0);

    pub fn is_invalid(self) -> bool {
        self.0 == 0
    }
}

/// A matching document and its score. Higher scores rank first.
///
/// Equality and ordering only consider `id`, so result sets can be merged
/// and deduplicated without looking at scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: DocumentHandle,
    pub score: i32,
}

impl SearchResult {
    pub fn new(id: DocumentHandle, score: i32) -> Self {
        Self { id, score }
    }
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SearchResult {}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchResult {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

/// A typed property value attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Number(_) => None,
            PropertyValue::Text(s) => Some(s),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Number(value as f64)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(n) => write!(f, "{}", n),
            PropertyValue::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_equality_ignores_score() {
        let a = SearchResult::new(DocumentHandle(3), 10);
        let b = SearchResult::new(DocumentHandle(3), -4);
        assert_eq!(a, b);
        assert!(SearchResult::new(DocumentHandle(1), 99) < a);
    }

    #[test]
    fn test_invalid_handles() {
        assert!(DocumentHandle::INVALID.is_invalid());
        assert!(!DocumentHandle(1).is_invalid());
        assert!(QueryHandle::default().is_invalid());
    }

    #[test]
    fn test_property_value_untagged_serde() {
        let number: PropertyValue = serde_json::from_str("150").unwrap();
        assert_eq!(number, PropertyValue::Number(150.0));
        let text: PropertyValue = serde_json::from_str("\"Energy\"").unwrap();
        assert_eq!(text.as_text(), Some("Energy"));
    }
}
