//! Query command implementation.

use crate::cli::args::QueryArgs;
use crate::cli::output::{CommandResponse, Output};
use crate::database::SearchDatabase;
use crate::error::Result;
use crate::types::{DocumentHandle, PropertyValue};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub total: usize,
    pub results: Vec<QueryHit>,
}

#[derive(Debug, Serialize)]
pub struct QueryHit {
    pub id: DocumentHandle,
    pub name: String,
    pub score: i32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,
}

pub fn search(db: &SearchDatabase, text: &str, limit: Option<usize>) -> Result<QueryResponse> {
    let results = db.query_sync(text)?;
    let total = results.len();
    let hits = results
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|result| QueryHit {
            id: result.id,
            name: db.document_name(result.id).unwrap_or_default(),
            score: result.score,
            properties: db.document_properties(result.id),
        })
        .collect();

    Ok(QueryResponse {
        query: text.to_string(),
        total,
        results: hits,
    })
}

pub fn run(db: &SearchDatabase, args: &QueryArgs, output: &Output) -> Result<()> {
    let response = search(db, &args.text, args.limit)?;
    output.print(&CommandResponse::data(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_ranks_and_limits() {
        let db = SearchDatabase::default();
        let apple = db.add_document("apple");
        let pie = db.add_document("pie");
        db.index_text(apple, "apple", true);
        db.index_text(pie, "applesauce", true);
        db.index_property(pie, "price", 3.0, true);

        let response = search(&db, "appl", None).unwrap();
        assert_eq!(response.total, 2);

        let response = search(&db, "apple", Some(1)).unwrap();
        assert_eq!(response.total, 2);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].name, "apple");

        let response = search(&db, "price>1", None).unwrap();
        assert_eq!(response.results[0].properties["price"], PropertyValue::Number(3.0));
    }

    #[test]
    fn test_search_invalid_query() {
        let db = SearchDatabase::default();
        assert!(matches!(search(&db, "(apple", None), Err(crate::error::SearchError::Query(_))));
    }
}
