//! Table of posted queries and their evaluation outcome.

use crate::error::QueryError;
use crate::types::{QueryHandle, SearchResult};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum QueryStatus {
    Pending,
    Completed(Arc<[SearchResult]>),
    Failed(QueryError),
}

#[derive(Debug)]
struct QueryEntry {
    text: String,
    status: QueryStatus,
}

#[derive(Debug)]
pub struct QueryTable {
    next_handle: u32,
    entries: HashMap<QueryHandle, QueryEntry>,
}

impl Default for QueryTable {
    fn default() -> Self {
        Self {
            next_handle: 1,
            entries: HashMap::new(),
        }
    }
}

impl QueryTable {
    pub fn allocate(&mut self, text: &str) -> QueryHandle {
        let handle = QueryHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.insert(
            handle,
            QueryEntry {
                text: text.to_string(),
                status: QueryStatus::Pending,
            },
        );
        handle
    }

    /// Record the outcome of an evaluation. Ignored if the query was disposed.
    pub fn complete(&mut self, handle: QueryHandle, outcome: Result<Vec<SearchResult>, QueryError>) {
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.status = match outcome {
                Ok(results) => QueryStatus::Completed(results.into()),
                Err(e) => QueryStatus::Failed(e),
            };
        }
    }

    pub fn status(&self, handle: QueryHandle) -> Option<&QueryStatus> {
        self.entries.get(&handle).map(|entry| &entry.status)
    }

    pub fn text(&self, handle: QueryHandle) -> Option<&str> {
        self.entries.get(&handle).map(|entry| entry.text.as_str())
    }

    pub fn dispose(&mut self, handle: QueryHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryErrorKind;
    use crate::types::DocumentHandle;

    #[test]
    fn test_lifecycle() {
        let mut table = QueryTable::default();
        let first = table.allocate("apple");
        let second = table.allocate("pear");
        assert_eq!(first, QueryHandle(1));
        assert_eq!(second, QueryHandle(2));
        assert!(matches!(table.status(first), Some(QueryStatus::Pending)));

        table.complete(first, Ok(vec![SearchResult::new(DocumentHandle(4), 1)]));
        let Some(QueryStatus::Completed(results)) = table.status(first) else {
            panic!("expected completed query");
        };
        assert_eq!(results.len(), 1);
        assert_eq!(table.text(first), Some("apple"));

        assert!(table.dispose(first));
        assert!(!table.dispose(first));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_completion_after_dispose_is_ignored() {
        let mut table = QueryTable::default();
        let handle = table.allocate("x");
        table.dispose(handle);
        table.complete(
            handle,
            Err(QueryError::new(QueryErrorKind::InvalidOperator, "x", "bad")),
        );
        assert!(table.status(handle).is_none());
        assert!(table.is_empty());
    }
}
